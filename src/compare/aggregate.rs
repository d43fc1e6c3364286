//! Turns the tagged token stream into paragraph-aware change records

use super::text::append_word;
use super::types::{
    BoundingBox, ChangeSide, CompareChange, DiffKind, DiffToken, DiffTotals, Pane, TokenMetadata,
    is_sentinel,
};

/// Change id of every token on one side, parallel to that side's tokens
pub type GroupMap = Vec<Option<String>>;

/// Output of [`build_changes`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregation {
    pub changes: Vec<CompareChange>,
    pub base_groups: GroupMap,
    pub comparison_groups: GroupMap,
}

impl Aggregation {
    #[must_use]
    pub fn groups(&self, pane: Pane) -> &GroupMap {
        match pane {
            Pane::Base => &self.base_groups,
            Pane::Comparison => &self.comparison_groups,
        }
    }
}

/// Count classified tokens, ignoring sentinels
#[must_use]
pub fn aggregate_totals(tokens: &[DiffToken]) -> DiffTotals {
    tokens
        .iter()
        .filter(|t| !t.is_sentinel())
        .fold(DiffTotals::default(), |mut totals, token| {
            match token.kind {
                DiffKind::Added => totals.added += 1,
                DiffKind::Removed => totals.removed += 1,
                DiffKind::Unchanged => totals.unchanged += 1,
            }
            totals
        })
}

/// Tracks the paragraph a side of the open change belongs to
type ParagraphKey = (usize, usize);

fn paragraph_key(meta: Option<&TokenMetadata>) -> Option<ParagraphKey> {
    meta.map(|m| (m.page, m.paragraph))
}

struct SideCursor<'a> {
    metadata: &'a [TokenMetadata],
    index: usize,
    paragraph: Option<ParagraphKey>,
    /// Token indices that joined the open change
    pending: Vec<usize>,
    groups: GroupMap,
}

impl<'a> SideCursor<'a> {
    fn new(metadata: &'a [TokenMetadata]) -> Self {
        Self {
            metadata,
            index: 0,
            paragraph: None,
            pending: Vec::new(),
            groups: vec![None; metadata.len()],
        }
    }

    fn current(&self) -> Option<&'a TokenMetadata> {
        self.metadata.get(self.index)
    }

    fn advance(&mut self) {
        if self.index < self.metadata.len() {
            self.index += 1;
        }
    }

    fn commit(&mut self, id: Option<&str>) {
        for idx in self.pending.drain(..) {
            if let (Some(id), Some(slot)) = (id, self.groups.get_mut(idx)) {
                *slot = Some(id.to_string());
            }
        }
        self.paragraph = None;
    }
}

struct ChangeBuilder<'a> {
    changes: Vec<CompareChange>,
    current: Option<CompareChange>,
    base: SideCursor<'a>,
    comparison: SideCursor<'a>,
}

impl<'a> ChangeBuilder<'a> {
    fn side(&mut self, pane: Pane) -> &mut SideCursor<'a> {
        match pane {
            Pane::Base => &mut self.base,
            Pane::Comparison => &mut self.comparison,
        }
    }

    fn ensure_current(&mut self) -> &mut CompareChange {
        let next_id = format!("change-{}", self.changes.len());
        self.current.get_or_insert_with(|| CompareChange {
            id: next_id,
            base: None,
            comparison: None,
        })
    }

    fn flush(&mut self) {
        let kept = self.current.take().and_then(|mut change| {
            for side in [&mut change.base, &mut change.comparison].into_iter().flatten() {
                side.text = side.text.trim().to_string();
            }
            let has_text = |side: &Option<ChangeSide>| side.as_ref().is_some_and(|s| !s.text.is_empty());
            (has_text(&change.base) || has_text(&change.comparison)).then_some(change)
        });

        let id = kept.as_ref().map(|c| c.id.clone());
        self.base.commit(id.as_deref());
        self.comparison.commit(id.as_deref());
        if let Some(change) = kept {
            self.changes.push(change);
        }
    }

    fn push_changed(&mut self, pane: Pane, text: &str) {
        let meta = self.side(pane).current();
        let key = paragraph_key(meta);

        if is_sentinel(text) {
            self.flush();
            self.side(pane).advance();
            return;
        }

        let tracked = self.side(pane).paragraph;
        let side_text_open = self
            .current
            .as_ref()
            .and_then(|c| side_of(c, pane).as_ref())
            .is_some_and(|s| !s.text.trim().is_empty());

        if side_text_open && key.is_some() && tracked.is_some() && key != tracked {
            self.flush();
        }

        let change = self.ensure_current();
        let slot = side_of_mut(change, pane);
        match slot {
            Some(side) => {
                append_word(&mut side.text, text);
                if side.page.is_none() {
                    side.page = meta.map(|m| m.page);
                }
                if side.paragraph.is_none() {
                    side.paragraph = meta.map(|m| m.paragraph);
                }
            }
            None => {
                *slot = Some(ChangeSide {
                    text: text.to_string(),
                    page: meta.map(|m| m.page),
                    paragraph: meta.map(|m| m.paragraph),
                });
            }
        }

        let cursor = self.side(pane);
        if key.is_some() {
            cursor.paragraph = key;
        }
        if cursor.index < cursor.metadata.len() {
            let index = cursor.index;
            cursor.pending.push(index);
        }
        cursor.advance();
    }
}

fn side_of(change: &CompareChange, pane: Pane) -> &Option<ChangeSide> {
    match pane {
        Pane::Base => &change.base,
        Pane::Comparison => &change.comparison,
    }
}

fn side_of_mut(change: &mut CompareChange, pane: Pane) -> &mut Option<ChangeSide> {
    match pane {
        Pane::Base => &mut change.base,
        Pane::Comparison => &mut change.comparison,
    }
}

/// Group a tagged token stream into change records.
///
/// `removed` tokens advance the base metadata cursor, `added` tokens the
/// comparison cursor and `unchanged` tokens both. Sentinels never start a
/// change and always close the open one.
#[must_use]
pub fn build_changes(
    tokens: &[DiffToken],
    base_metadata: &[TokenMetadata],
    comparison_metadata: &[TokenMetadata],
) -> Aggregation {
    let mut builder = ChangeBuilder {
        changes: Vec::new(),
        current: None,
        base: SideCursor::new(base_metadata),
        comparison: SideCursor::new(comparison_metadata),
    };

    for token in tokens {
        match token.kind {
            DiffKind::Removed => builder.push_changed(Pane::Base, &token.text),
            DiffKind::Added => builder.push_changed(Pane::Comparison, &token.text),
            DiffKind::Unchanged => {
                builder.flush();
                builder.base.advance();
                builder.comparison.advance();
            }
        }
    }
    builder.flush();

    Aggregation {
        changes: builder.changes,
        base_groups: builder.base.groups,
        comparison_groups: builder.comparison.groups,
    }
}

/// Per-side highlight flags, parallel to that side's tokens.
///
/// A flag is set for every token the diff classified as changed on that side.
#[must_use]
pub fn highlight_flags(
    tokens: &[DiffToken],
    base_len: usize,
    comparison_len: usize,
) -> (Vec<bool>, Vec<bool>) {
    let mut base = vec![false; base_len];
    let mut comparison = vec![false; comparison_len];
    let (mut i, mut j) = (0usize, 0usize);

    for token in tokens {
        let sentinel = token.is_sentinel();
        match token.kind {
            DiffKind::Removed => {
                if let Some(flag) = base.get_mut(i) {
                    *flag = !sentinel;
                }
                i += 1;
            }
            DiffKind::Added => {
                if let Some(flag) = comparison.get_mut(j) {
                    *flag = !sentinel;
                }
                j += 1;
            }
            DiffKind::Unchanged => {
                i = (i + 1).min(base_len);
                j = (j + 1).min(comparison_len);
            }
        }
    }
    (base, comparison)
}

/// A non-sentinel token with its position and highlight state
#[derive(Clone, Debug, PartialEq)]
pub struct VisibleToken {
    pub token: String,
    pub page: usize,
    pub paragraph: usize,
    pub bbox: Option<BoundingBox>,
    pub has_highlight: bool,
    /// Index into the side's full token array
    pub meta_index: usize,
}

/// Visible tokens of one side, with sentinels removed
#[must_use]
pub fn visible_tokens(
    tokens: &[String],
    metadata: &[TokenMetadata],
    flags: &[bool],
) -> Vec<VisibleToken> {
    tokens
        .iter()
        .zip(metadata)
        .enumerate()
        .filter(|(_, (token, _))| !is_sentinel(token))
        .map(|(index, (token, meta))| VisibleToken {
            token: token.clone(),
            page: meta.page,
            paragraph: meta.paragraph,
            bbox: meta.bbox,
            has_highlight: flags.get(index).copied().unwrap_or(false),
            meta_index: index,
        })
        .collect()
}
