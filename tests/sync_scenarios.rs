use pagediff::compare::{BoundingBox, HighlightIndex, PagePreview, Pane, TokenMetadata};
use pagediff::sync::{
    ChangeNavigator, Command, Effect, FLASH_DURATION_MS, HighlightLocator, MountedHighlights,
    NavigationTarget, Pan, Size, SyncController,
};

fn pages(count: usize, rotation: i32) -> Vec<PagePreview> {
    (1..=count)
        .map(|page_number| PagePreview {
            page_number,
            width: 600.0,
            height: 800.0,
            url: format!("page-{page_number}.png"),
            rotation,
        })
        .collect()
}

fn controller(comparison_rotation: i32) -> SyncController {
    let mut sync = SyncController::default();
    let _ = sync.apply(Command::SetPages {
        pane: Pane::Base,
        pages: pages(3, 0),
    });
    let _ = sync.apply(Command::SetPages {
        pane: Pane::Comparison,
        pages: pages(3, comparison_rotation),
    });
    for pane in [Pane::Base, Pane::Comparison] {
        let _ = sync.apply(Command::Resize {
            pane,
            viewport: Size::new(600.0, 1000.0),
            content_height: None,
        });
    }
    sync
}

fn scroll_of(effects: &[Effect], pane: Pane) -> Option<f32> {
    effects.iter().find_map(|e| match e {
        Effect::ScrollTo { pane: p, top } if *p == pane => Some(*top),
        _ => None,
    })
}

fn has_scroll(effects: &[Effect]) -> bool {
    effects
        .iter()
        .any(|e| matches!(e, Effect::ScrollTo { .. } | Effect::ScrollToPoint { .. }))
}

#[test]
fn toggling_link_without_scrolling_moves_nothing() {
    let mut sync = controller(0);
    let effects = sync.apply(Command::Scrolled {
        pane: Pane::Base,
        top: 500.0,
    });
    assert!(scroll_of(&effects, Pane::Comparison).is_some());
    let _ = sync.apply(Command::Scrolled {
        pane: Pane::Comparison,
        top: 500.0,
    });
    let _ = sync.apply(Command::FrameTick);

    assert_eq!(sync.apply(Command::SetLinked(false)), vec![Effect::LinkChanged(false)]);
    assert_eq!(sync.apply(Command::SetLinked(true)), vec![Effect::LinkChanged(true)]);
    assert_eq!(sync.scroll_top(Pane::Base), 500.0);
    assert_eq!(sync.scroll_top(Pane::Comparison), 500.0);
}

#[test]
fn relinking_keeps_the_offset_between_panes() {
    let mut sync = controller(0);
    let _ = sync.apply(Command::SetLinked(false));
    let _ = sync.apply(Command::Scrolled {
        pane: Pane::Base,
        top: 500.0,
    });
    let _ = sync.apply(Command::Scrolled {
        pane: Pane::Comparison,
        top: 900.0,
    });

    let effects = sync.apply(Command::SetLinked(true));
    assert!(!has_scroll(&effects));
    assert!((sync.anchors().base_to_comparison - 400.0).abs() < 0.5);

    let effects = sync.apply(Command::Scrolled {
        pane: Pane::Base,
        top: 600.0,
    });
    let top = scroll_of(&effects, Pane::Comparison).unwrap();
    assert!((top - 1000.0).abs() < 0.5, "{top}");
}

#[test]
fn pan_mirrors_into_rotated_peer() {
    let mut sync = controller(90);
    for pane in [Pane::Base, Pane::Comparison] {
        let _ = sync.apply(Command::SetZoom { pane, zoom: 2.0 });
    }
    assert!(sync.is_pan_mode());

    let _ = sync.apply(Command::PanStart {
        pane: Pane::Base,
        x: 700.0,
        y: 100.0,
    });
    let effects = sync.apply(Command::PanMove { x: 100.0, y: 100.0 });
    assert!(effects.contains(&Effect::SetPan {
        pane: Pane::Base,
        pan: Pan::new(600.0, 0.0)
    }));
    assert_eq!(sync.pan(Pane::Comparison), Pan::new(600.0, 800.0));
}

#[test]
fn unlinked_pan_stays_in_its_pane() {
    let mut sync = controller(0);
    let _ = sync.apply(Command::SetLinked(false));
    for pane in [Pane::Base, Pane::Comparison] {
        let _ = sync.apply(Command::SetZoom { pane, zoom: 2.0 });
    }
    let before = sync.pan(Pane::Comparison);
    let _ = sync.apply(Command::PanStart {
        pane: Pane::Base,
        x: 500.0,
        y: 500.0,
    });
    let _ = sync.apply(Command::PanMove { x: 400.0, y: 400.0 });
    assert_eq!(sync.pan(Pane::Comparison), before);
}

#[test]
fn navigation_scrolls_then_centers_and_flashes() {
    let mut sync = controller(0);
    let metadata = [TokenMetadata {
        page: 2,
        paragraph: 1,
        bbox: Some(BoundingBox::new(0.1, 0.5, 0.2, 0.02)),
    }];
    let index = HighlightIndex::build(&metadata, &[Some("change-1".to_string())]);
    let mut mounted = MountedHighlights::new();
    let mut navigator = ChangeNavigator::new();

    let target = NavigationTarget {
        pane: Pane::Comparison,
        group_id: "change-1".to_string(),
        page: Some(2),
    };
    let effects = navigator.navigate(target, &mut sync, &mounted);
    assert_eq!(scroll_of(&effects, Pane::Comparison), Some(840.0));
    assert!(navigator.is_pending());

    // the page comes into view and its highlights mount
    let page_top = sync.rows().page_top(Pane::Comparison, 2).unwrap();
    mounted.mount_page(
        Pane::Comparison,
        2,
        page_top,
        Size::new(600.0, 800.0),
        0,
        &index,
    );
    assert_eq!(mounted.locate(Pane::Comparison, "change-1").len(), 1);

    let effects = navigator.on_frame(&mut sync, &mounted);
    assert!(!navigator.is_pending());
    let (top, left) = effects
        .iter()
        .find_map(|e| match e {
            Effect::ScrollToPoint { pane, top, left } if *pane == Pane::Comparison => {
                Some((*top, *left))
            }
            _ => None,
        })
        .unwrap();
    // rect top 840 + 402, height 16, centred in a 1000 px viewport
    assert!((top - 750.0).abs() < 0.5, "{top}");
    assert_eq!(left, 0.0);
    assert!(effects.contains(&Effect::Flash {
        pane: Pane::Comparison,
        group_id: "change-1".to_string(),
        duration_ms: FLASH_DURATION_MS,
    }));
}

#[test]
fn navigation_to_mounted_change_is_immediate() {
    let mut sync = controller(0);
    let metadata = [TokenMetadata {
        page: 1,
        paragraph: 1,
        bbox: Some(BoundingBox::new(0.2, 0.1, 0.1, 0.02)),
    }];
    let index = HighlightIndex::build(&metadata, &[Some("change-2".to_string())]);
    let mut mounted = MountedHighlights::new();
    mounted.mount_page(Pane::Base, 1, 0.0, Size::new(600.0, 800.0), 0, &index);

    let mut navigator = ChangeNavigator::new();
    let target = NavigationTarget {
        pane: Pane::Base,
        group_id: "change-2".to_string(),
        page: Some(1),
    };
    let effects = navigator.navigate(target, &mut sync, &mounted);
    assert!(!navigator.is_pending());
    assert!(effects.iter().any(|e| matches!(e, Effect::Flash { .. })));
}
