use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tile_sheet_core::error::TileSheetError;
use tile_sheet_core::layout::GridLayout;
use tile_sheet_core::model::Rect;

fn disjoint(rects: &[Rect]) -> bool {
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if rects[i].overlaps(&rects[j]) {
                return false;
            }
        }
    }
    true
}

#[test]
fn four_mixed_tiles_make_a_two_by_two_grid() {
    let sizes = [(100, 50), (80, 60), (60, 80), (50, 100)];
    let layout = GridLayout::compute(&sizes).unwrap();

    assert_eq!((layout.cols, layout.rows), (2, 2));
    assert_eq!(layout.col_widths, vec![100, 80]);
    assert_eq!(layout.row_heights, vec![60, 100]);
    assert_eq!((layout.width(), layout.height()), (180, 160));

    let positions: Vec<(u32, u32)> = layout.placements.iter().map(|r| (r.x, r.y)).collect();
    assert_eq!(positions, vec![(0, 0), (100, 0), (0, 60), (100, 60)]);
    for (r, &(w, h)) in layout.placements.iter().zip(&sizes) {
        assert_eq!((r.w, r.h), (w, h));
    }
}

#[test]
fn single_tile_has_no_padding() {
    let layout = GridLayout::compute(&[(37, 11)]).unwrap();
    assert_eq!((layout.cols, layout.rows), (1, 1));
    assert_eq!((layout.width(), layout.height()), (37, 11));
    assert_eq!(layout.placements, vec![Rect::new(0, 0, 37, 11)]);
}

#[test]
fn empty_input_is_rejected() {
    match GridLayout::compute(&[]) {
        Err(TileSheetError::InvalidInput(_)) => {}
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn grid_shape_is_near_square() {
    let cases = [
        (1, (1, 1)),
        (2, (2, 1)),
        (3, (2, 2)),
        (4, (2, 2)),
        (5, (3, 2)),
        (9, (3, 3)),
        (10, (4, 3)),
        (16, (4, 4)),
        (17, (5, 4)),
        (100, (10, 10)),
    ];
    for (n, expected) in cases {
        assert_eq!(GridLayout::grid_shape(n), expected, "n = {n}");
    }
}

#[test]
fn random_layouts_cover_every_tile_without_overlap() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for n in 1..=40 {
        let sizes: Vec<(u32, u32)> = (0..n)
            .map(|_| (rng.gen_range(1..=64), rng.gen_range(1..=64)))
            .collect();
        let layout = GridLayout::compute(&sizes).unwrap();

        assert_eq!(layout.placements.len(), n);
        assert!(disjoint(&layout.placements), "overlap for n = {n}");
        let canvas = Rect::new(0, 0, layout.width(), layout.height());
        for (i, (r, &(w, h))) in layout.placements.iter().zip(&sizes).enumerate() {
            assert_eq!((r.w, r.h), (w, h));
            assert!(canvas.contains(r), "tile {i} outside canvas for n = {n}");
            // top-left of its cell
            let cell = layout.cell_rect(i);
            assert_eq!((cell.x, cell.y), (r.x, r.y));
            assert!(cell.contains(r));
        }
    }
}

#[test]
fn layout_is_deterministic() {
    let sizes = [(3, 9), (12, 4), (7, 7), (1, 30), (25, 2)];
    let a = GridLayout::compute(&sizes).unwrap();
    let b = GridLayout::compute(&sizes).unwrap();
    assert_eq!(a, b);
}

#[test]
fn canvas_overflowing_u32_is_rejected() {
    let sizes = [(u32::MAX, 1), (2, 1)];
    assert!(matches!(
        GridLayout::compute(&sizes),
        Err(TileSheetError::InvalidInput(_))
    ));
}
