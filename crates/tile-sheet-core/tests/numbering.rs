use tile_sheet_core::naming::{
    allocate_sheet_indices, check_record_filename, next_sheet_index, parse_sheet_index,
    restored_filename, tile_filename, tile_format,
};
use std::path::Path;
use tile_sheet_core::error::TileSheetError;

#[test]
fn empty_directory_starts_at_one() {
    assert_eq!(next_sheet_index(Vec::<String>::new(), "sheet").unwrap(), 1);
}

#[test]
fn next_index_follows_the_maximum() {
    let names = ["sheet1.png", "sheet1.json", "sheet7.json", "sheet3.png"];
    assert_eq!(next_sheet_index(names, "sheet").unwrap(), 8);
}

#[test]
fn malformed_names_are_ignored() {
    let names = [
        "sheet2.png",
        "sheetx.png",
        "sheet.png",
        "sheet-9.png",
        "sheet99.txt",
        "other50.png",
        "sheet4.png.bak",
        "notes.json",
    ];
    assert_eq!(next_sheet_index(names, "sheet").unwrap(), 3);
    assert_eq!(parse_sheet_index("sheet12.json", "sheet"), Some(12));
    assert_eq!(parse_sheet_index("sheet1a.png", "sheet"), None);
    assert_eq!(parse_sheet_index("Sheet1.png", "sheet"), None);
}

#[test]
fn custom_prefix_only_counts_its_own_sheets() {
    let names = ["sheet40.png", "grid2.png", "grid5.json"];
    assert_eq!(next_sheet_index(names, "grid").unwrap(), 6);
    assert_eq!(next_sheet_index(names, "sheet").unwrap(), 41);
}

#[test]
fn allocation_is_contiguous_and_monotonic() {
    let mut names: Vec<String> = vec!["sheet3.png".into(), "sheet3.json".into()];
    let first = allocate_sheet_indices(&names, "sheet", 4).unwrap();
    assert_eq!(first, 4..8);
    for i in first {
        names.push(format!("sheet{i}.png"));
        names.push(format!("sheet{i}.json"));
    }
    let second = allocate_sheet_indices(&names, "sheet", 2).unwrap();
    assert_eq!(second, 8..10);
}

#[test]
fn exhausted_index_space_is_an_error() {
    let names = [format!("sheet{}.png", u64::MAX)];
    assert!(matches!(
        next_sheet_index(&names, "sheet"),
        Err(TileSheetError::InvalidInput(_))
    ));

    let names = [format!("sheet{}.json", u64::MAX - 1)];
    assert_eq!(next_sheet_index(&names, "sheet").unwrap(), u64::MAX);
    assert!(matches!(
        allocate_sheet_indices(&names, "sheet", 2),
        Err(TileSheetError::InvalidInput(_))
    ));
    assert_eq!(allocate_sheet_indices(&names, "sheet", 0).unwrap(), u64::MAX..u64::MAX);
}

#[test]
fn restored_names_keep_the_stem() {
    assert_eq!(restored_filename("cat.png", "s", "png"), "cats.png");
    assert_eq!(restored_filename("a.b.jpeg", "_r", "jpg"), "a.b_r.jpg");
    assert_eq!(restored_filename("noext", "", "png"), "noext.png");
}

#[test]
fn tile_addressing_uses_base_name_and_lowercase_extension() {
    let p = Path::new("some/dir/Photo.JPG");
    assert_eq!(tile_filename(p), "Photo.JPG");
    assert_eq!(tile_format(p).as_deref(), Some("jpg"));
    assert_eq!(tile_format(Path::new("README")), None);
}

#[test]
fn escaping_record_names_are_rejected() {
    for bad in ["", ".", "..", "../x.png", "a/b.png", "a\\b.png", "x\0.png"] {
        assert!(check_record_filename(bad).is_err(), "{bad:?} accepted");
    }
    assert!(check_record_filename("ok name.png").is_ok());
}
