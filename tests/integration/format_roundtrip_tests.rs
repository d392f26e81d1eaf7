/*!
 * Extract / reinject round trips for every supported format
 */

use std::io::{Cursor, Read};

use doctrans::formats::pptx::PptxHandler;
use doctrans::formats::xlsx::XlsxHandler;
use doctrans::formats::{ChunkLimits, Document, FormatHandler, FormatKind, OutputMode};
use doctrans::translation::{TranslationUnit, UnitStatus};

use crate::common;

fn identity(units: &mut [TranslationUnit]) {
    for unit in units.iter_mut().filter(|u| u.status == UnitStatus::Pending) {
        unit.translated_text = Some(unit.original_text.clone());
        unit.status = UnitStatus::Complete;
    }
}

fn tag(units: &mut [TranslationUnit]) {
    for unit in units.iter_mut().filter(|u| u.status == UnitStatus::Pending) {
        unit.translated_text = Some(format!("[T] {}", unit.original_text.trim()));
        unit.status = UnitStatus::Complete;
    }
}

fn pending_texts(units: &[TranslationUnit]) -> Vec<String> {
    units
        .iter()
        .filter(|u| u.status == UnitStatus::Pending)
        .map(|u| u.original_text.clone())
        .collect()
}

/// Extract, apply `translate`, reinject and serialize
fn round_trip(
    kind: FormatKind,
    bytes: Vec<u8>,
    mode: OutputMode,
    translate: fn(&mut [TranslationUnit]),
) -> Vec<u8> {
    let mut document = Document::from_bytes(kind, bytes).unwrap();
    let mut units = document.extract(&ChunkLimits::default()).unwrap();
    translate(&mut units);
    document.reinject(&units, mode).unwrap();
    document.to_bytes().unwrap()
}

/// Extract, translate only the unit whose text is `target`, reinject and serialize
fn translate_one(kind: FormatKind, bytes: Vec<u8>, target: &str) -> Vec<u8> {
    let mut document = Document::from_bytes(kind, bytes).unwrap();
    let mut units = document.extract(&ChunkLimits::default()).unwrap();
    let mut hits = 0;
    for unit in units
        .iter_mut()
        .filter(|u| u.status == UnitStatus::Pending && u.original_text.trim() == target)
    {
        unit.translated_text = Some(format!("[T] {}", target));
        unit.status = UnitStatus::Complete;
        hits += 1;
    }
    assert_eq!(hits, 1, "expected one unit reading {:?}", target);
    document.reinject(&units, OutputMode::Only).unwrap();
    document.to_bytes().unwrap()
}

fn read_part_bytes(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut content = Vec::new();
    part.read_to_end(&mut content).unwrap();
    content
}

fn read_part(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut content = String::new();
    part.read_to_string(&mut content).unwrap();
    content
}

fn sample_docx() -> Vec<u8> {
    let body = format!(
        "{}{}<w:tbl><w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc></w:tr></w:tbl>{}",
        common::word_paragraph(&["Annual ", "report"]),
        r#"<w:p><w:r><w:drawing><wp:inline>chart</wp:inline></w:drawing></w:r></w:p>"#,
        common::word_paragraph(&["Region"]),
        common::word_paragraph(&["2024-03-31"]),
        common::word_paragraph(&["Closing remarks."]),
    );
    common::docx_bytes(&body)
}

#[test]
fn test_identityTranslation_withEveryFormat_shouldReproduceSource() {
    let samples: Vec<(FormatKind, Vec<u8>)> = vec![
        (FormatKind::Docx, sample_docx()),
        (
            FormatKind::Xlsx,
            common::xlsx_bytes(
                &["Name", "Comment"],
                r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1"><v>7</v></c></row>"#,
                &[],
            ),
        ),
        (
            FormatKind::Pptx,
            common::pptx_bytes(&[&common::text_shape(&["Quarterly review", "Agenda"])]),
        ),
        (FormatKind::Csv, b"name,comment\nAlice,\"Hello, world\"\n".to_vec()),
        (
            FormatKind::Markdown,
            "# Title\n\nSome `code` and a [link](http://example.com).\n\n- one\n- two\n".as_bytes().to_vec(),
        ),
        (FormatKind::Text, "First paragraph.\n\n  Second paragraph.\n".as_bytes().to_vec()),
    ];

    for (kind, bytes) in samples {
        let out = round_trip(kind, bytes.clone(), OutputMode::Only, identity);
        assert_eq!(out, bytes, "{} changed under identity translation", kind);
    }
}

#[test]
fn test_docx_withTranslation_shouldKeepNonTextAndOrder() {
    let out = round_trip(FormatKind::Docx, sample_docx(), OutputMode::Only, tag);

    let reopened = Document::from_bytes(FormatKind::Docx, out.clone()).unwrap();
    let units = reopened.extract(&ChunkLimits::default()).unwrap();
    let texts: Vec<&str> = units.iter().map(|u| u.original_text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["[T] Annual report", "[T] Region", "2024-03-31", "[T] Closing remarks."]
    );

    let body = read_part(&out, "word/document.xml");
    assert!(body.contains("<w:drawing>"));
    assert!(body.contains("<w:tbl>"));
}

#[test]
fn test_xlsx_withMergedRange_shouldTranslateAnchorOnly() {
    let sheet = concat!(
        r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"/></row>"#,
        r#"<row r="2"><c r="A2"/><c r="B2"/></row>"#,
        r#"<row r="3"><c r="A3" t="s"><v>1</v></c><c r="B3"><v>42</v></c></row>"#,
    );
    let bytes = common::xlsx_bytes(&["Q1 Revenue", "Notes"], sheet, &["A1:B2"]);

    let mut document = Document::from_bytes(FormatKind::Xlsx, bytes).unwrap();
    let mut units = document.extract(&ChunkLimits::default()).unwrap();
    let revenue: Vec<_> = units.iter().filter(|u| u.original_text == "Q1 Revenue").collect();
    assert_eq!(revenue.len(), 1);
    assert_eq!(pending_texts(&units), vec!["Q1 Revenue", "Notes"]);

    tag(&mut units);
    document.reinject(&units, OutputMode::Only).unwrap();
    let handler = XlsxHandler::open(document.to_bytes().unwrap()).unwrap();

    assert_eq!(handler.cell_value("Data", 0, 0).as_deref(), Some("[T] Q1 Revenue"));
    assert_eq!(handler.cell_value("Data", 0, 1), None);
    assert_eq!(handler.cell_value("Data", 1, 0), None);
    assert_eq!(handler.cell_value("Data", 1, 1), None);
    assert_eq!(handler.cell_value("Data", 2, 0).as_deref(), Some("[T] Notes"));
}

#[test]
fn test_xlsx_withBilingualMode_shouldKeepOriginalLineFirst() {
    let bytes = common::xlsx_bytes(&["Revenue"], r#"<row r="1"><c r="A1" t="s"><v>0</v></c></row>"#, &[]);
    let out = round_trip(FormatKind::Xlsx, bytes, OutputMode::Bilingual, tag);
    let handler = XlsxHandler::open(out).unwrap();
    assert_eq!(handler.cell_value("Data", 0, 0).as_deref(), Some("Revenue\n[T] Revenue"));
}

#[test]
fn test_pptx_withSeveralSlides_shouldFollowPresentationOrder() {
    let second = format!(
        "{}<p:pic><p:blipFill/></p:pic>",
        common::text_shape(&["Thank you"])
    );
    let bytes = common::pptx_bytes(&[&common::text_shape(&["Quarterly review", "Agenda"]), &second]);

    let out = round_trip(FormatKind::Pptx, bytes, OutputMode::Only, tag);
    let handler = PptxHandler::open(out.clone()).unwrap();
    assert_eq!(handler.slide_count(), 2);
    let units = handler.extract(&ChunkLimits::default()).unwrap();
    let texts: Vec<&str> = units.iter().map(|u| u.original_text.as_str()).collect();
    assert_eq!(texts, vec!["[T] Quarterly review", "[T] Agenda", "[T] Thank you"]);
    assert!(read_part(&out, "ppt/slides/slide2.xml").contains("<p:pic>"));
}

#[test]
fn test_csv_withTranslation_shouldGateCellsAndQuote() {
    let bytes = b"name,price\nBlue chair,19.99\n".to_vec();
    let out = round_trip(FormatKind::Csv, bytes, OutputMode::Only, tag);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "[T] name,[T] price\n[T] Blue chair,19.99\n"
    );
}

#[test]
fn test_markdown_withTranslation_shouldRestoreProtectedSpans() {
    let source = "# Title\n\nSee [the guide](http://example.com/guide) and run `make`.\n\n```rust\nlet x = 1;\n```\n";
    let out = round_trip(FormatKind::Markdown, source.as_bytes().to_vec(), OutputMode::Only, tag);
    let out = String::from_utf8(out).unwrap();

    assert!(out.starts_with("# [T] Title\n"));
    assert!(out.contains("[T] See [the guide](http://example.com/guide) and run `make`."));
    assert!(out.contains("```rust\nlet x = 1;\n```"));
}

#[test]
fn test_text_withBilingualMode_shouldAppendTranslationAfterParagraph() {
    let out = round_trip(
        FormatKind::Text,
        "Hello there.\n\nSecond one.".as_bytes().to_vec(),
        OutputMode::Bilingual,
        tag,
    );
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Hello there.\n\n[T] Hello there.\n\nSecond one.\n\n[T] Second one."
    );
}

#[test]
fn test_open_withUnsupportedOrLegacyBytes_shouldFailStructurally() {
    let dir = common::create_temp_dir().unwrap();
    let pdf = common::create_test_file(dir.path(), "scan.pdf", b"%PDF-1.7").unwrap();
    assert!(Document::open(&pdf).is_err());

    let legacy = common::create_test_file(dir.path(), "old.doc", b"\xD0\xCF\x11\xE0binary").unwrap();
    assert!(Document::open(&legacy).is_err());

    let disguised = common::create_test_file(dir.path(), "new.doc", &sample_docx()).unwrap();
    assert_eq!(Document::open(&disguised).unwrap().kind(), FormatKind::Docx);
}

#[test]
fn test_docx_withOneUnitTranslated_shouldLeaveOtherParagraphsAndPartsIntact() {
    let styled = r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>Region summary</w:t></w:r></w:p>"#;
    let first = common::word_paragraph(&["Annual ", "report"]);
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}{}{}</w:body></w:document>"#,
        first,
        styled,
        common::word_paragraph(&["Closing remarks."]),
    );
    let header = r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:p><w:r><w:t>Confidential</w:t></w:r></w:p></w:hdr>"#;
    let source = common::zip_package(&[
        ("[Content_Types].xml", "<Types/>"),
        ("word/document.xml", &document),
        ("word/header1.xml", header),
    ]);

    let out = translate_one(FormatKind::Docx, source.clone(), "Closing remarks.");

    let reopened = Document::from_bytes(FormatKind::Docx, out.clone()).unwrap();
    let units = reopened.extract(&ChunkLimits::default()).unwrap();
    let mut texts: Vec<&str> = units.iter().map(|u| u.original_text.as_str()).collect();
    texts.sort_unstable();
    assert_eq!(
        texts,
        vec!["Annual report", "Confidential", "Region summary", "[T] Closing remarks."]
    );

    let body = read_part(&out, "word/document.xml");
    assert!(body.contains(&first));
    assert!(body.contains(styled));
    for part in ["[Content_Types].xml", "word/header1.xml"] {
        assert_eq!(read_part_bytes(&out, part), read_part_bytes(&source, part), "{} changed", part);
    }
}

#[test]
fn test_docx_withBilingualNumberedSectionEnd_shouldKeepOneListAndSection() {
    let body = concat!(
        r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr>"#,
        r#"<w:sectPr><w:pgSz w:w="11906"/></w:sectPr></w:pPr>"#,
        r#"<w:r><w:t>First item</w:t></w:r></w:p>"#,
    );
    let out = round_trip(FormatKind::Docx, common::docx_bytes(body), OutputMode::Bilingual, tag);

    let xml = read_part(&out, "word/document.xml");
    assert_eq!(xml.matches("<w:numPr>").count(), 1);
    assert_eq!(xml.matches("<w:sectPr>").count(), 1);
    let translated_at = xml.find("[T] First item").unwrap();
    let section_at = xml.find("<w:sectPr>").unwrap();
    assert!(xml.find(">First item<").unwrap() < section_at && section_at < translated_at);
    assert!(xml.find("<w:numPr>").unwrap() < xml.find(">First item<").unwrap());
}

#[test]
fn test_xlsx_withOneUnitTranslated_shouldLeaveOtherCellsAndPartsIntact() {
    let workbook = concat!(
        r#"<workbook xmlns:r="r"><sheets>"#,
        r#"<sheet name="Data" sheetId="1" r:id="rId1"/><sheet name="Notes" sheetId="2" r:id="rId2"/>"#,
        r#"</sheets></workbook>"#,
    );
    let rels = concat!(
        r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/>"#,
        r#"<Relationship Id="rId2" Target="worksheets/sheet2.xml"/></Relationships>"#,
    );
    let first_sheet = concat!(
        r#"<worksheet><sheetData><row r="1">"#,
        r#"<c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c>"#,
        r#"<c r="C1"><v>7</v></c><c r="D1"><f>SUM(C1:C1)</f><v>7</v></c>"#,
        r#"</row></sheetData></worksheet>"#,
    );
    let second_sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>2</v></c></row></sheetData></worksheet>"#;
    let shared = r#"<sst count="3" uniqueCount="3"><si><t>Name</t></si><si><t>Comment</t></si><si><t>Other sheet</t></si></sst>"#;
    let source = common::zip_package(&[
        ("[Content_Types].xml", "<Types/>"),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", rels),
        ("xl/sharedStrings.xml", shared),
        ("xl/worksheets/sheet1.xml", first_sheet),
        ("xl/worksheets/sheet2.xml", second_sheet),
    ]);

    let out = translate_one(FormatKind::Xlsx, source.clone(), "Comment");

    let handler = XlsxHandler::open(out.clone()).unwrap();
    assert_eq!(handler.cell_value("Data", 0, 0).as_deref(), Some("Name"));
    assert_eq!(handler.cell_value("Data", 0, 1).as_deref(), Some("[T] Comment"));
    assert_eq!(handler.cell_value("Notes", 0, 0).as_deref(), Some("Other sheet"));

    let sheet = read_part(&out, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<c r="A1" t="s"><v>0</v></c>"#));
    assert!(sheet.contains(r#"<c r="C1"><v>7</v></c>"#));
    assert!(sheet.contains(r#"<c r="D1"><f>SUM(C1:C1)</f><v>7</v></c>"#));
    for part in [
        "[Content_Types].xml",
        "xl/workbook.xml",
        "xl/sharedStrings.xml",
        "xl/worksheets/sheet2.xml",
    ] {
        assert_eq!(read_part_bytes(&out, part), read_part_bytes(&source, part), "{} changed", part);
    }
}

#[test]
fn test_pptx_withOneUnitTranslated_shouldLeaveOtherShapesAndSlidesIntact() {
    let source = common::pptx_bytes(&[
        &common::text_shape(&["Quarterly review", "Agenda"]),
        &common::text_shape(&["Thank you"]),
    ]);

    let out = translate_one(FormatKind::Pptx, source.clone(), "Agenda");

    let units = PptxHandler::open(out.clone())
        .unwrap()
        .extract(&ChunkLimits::default())
        .unwrap();
    let texts: Vec<&str> = units.iter().map(|u| u.original_text.as_str()).collect();
    assert_eq!(texts, vec!["Quarterly review", "[T] Agenda", "Thank you"]);

    assert!(read_part(&out, "ppt/slides/slide1.xml")
        .contains("<a:p><a:r><a:t>Quarterly review</a:t></a:r></a:p>"));
    for part in ["[Content_Types].xml", "ppt/presentation.xml", "ppt/slides/slide2.xml"] {
        assert_eq!(read_part_bytes(&out, part), read_part_bytes(&source, part), "{} changed", part);
    }
}

#[test]
fn test_textFormats_withOneUnitTranslated_shouldOnlyChangeThatUnit() {
    let cases = [
        (
            FormatKind::Csv,
            "name,comment,price\nAlice,Hello there,19.99\nBob,\"Hi, all\",5\n",
            "Hello there",
            "name,comment,price\nAlice,[T] Hello there,19.99\nBob,\"Hi, all\",5\n",
        ),
        (
            FormatKind::Markdown,
            "# Title\n\nFirst paragraph.\n\n| a | b |\n|---|---|\n| x | y |\n\n---\n\nLast one.\n",
            "First paragraph.",
            "# Title\n\n[T] First paragraph.\n\n| a | b |\n|---|---|\n| x | y |\n\n---\n\nLast one.\n",
        ),
        (
            FormatKind::Text,
            "One.\n\nTwo.\n\nThree.\n",
            "Two.",
            "One.\n\n[T] Two.\n\nThree.\n",
        ),
    ];

    for (kind, source, target, expected) in cases {
        let out = translate_one(kind, source.as_bytes().to_vec(), target);
        assert_eq!(String::from_utf8(out).unwrap(), expected, "{} output differs", kind);
    }
}
