/*!
 * Common test utilities for the doctrans test suite
 */

#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use doctrans::job::{JobRunner, JobSettings};
use doctrans::providers::Provider;
use doctrans::task::{MemoryTaskStore, ProviderKind, TaskConfig, TaskStore};
use doctrans::translation::{ProgressPolicy, RetryPolicy};

/// Route library logs to the test harness; set RUST_LOG to see them
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Zip container holding the given parts, in order
pub fn zip_package(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in parts {
        zout.start_file(*name, options).unwrap();
        zout.write_all(content.as_bytes()).unwrap();
    }
    zout.finish().unwrap().into_inner()
}

/// Word document whose body holds `body` verbatim
pub fn docx_bytes(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    zip_package(&[
        ("[Content_Types].xml", "<Types/>"),
        ("word/document.xml", &document),
    ])
}

/// Word paragraph with one run per entry
pub fn word_paragraph(runs: &[&str]) -> String {
    let runs: String = runs
        .iter()
        .map(|text| format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, text))
        .collect();
    format!("<w:p>{}</w:p>", runs)
}

/// Workbook with one sheet; `sheet_data` is the inner XML of `<sheetData>`
pub fn xlsx_bytes(shared_strings: &[&str], sheet_data: &str, merges: &[&str]) -> Vec<u8> {
    let strings: String = shared_strings
        .iter()
        .map(|s| format!("<si><t>{}</t></si>", s))
        .collect();
    let shared = format!(
        r#"<sst count="{0}" uniqueCount="{0}">{1}</sst>"#,
        shared_strings.len(),
        strings
    );
    let merge_cells = if merges.is_empty() {
        String::new()
    } else {
        let cells: String = merges
            .iter()
            .map(|r| format!(r#"<mergeCell ref="{}"/>"#, r))
            .collect();
        format!(r#"<mergeCells count="{}">{}</mergeCells>"#, merges.len(), cells)
    };
    let sheet = format!(
        r#"<worksheet><sheetData>{}</sheetData>{}</worksheet>"#,
        sheet_data, merge_cells
    );
    zip_package(&[
        ("[Content_Types].xml", "<Types/>"),
        (
            "xl/workbook.xml",
            r#"<workbook xmlns:r="r"><sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/></Relationships>"#,
        ),
        ("xl/sharedStrings.xml", &shared),
        ("xl/worksheets/sheet1.xml", &sheet),
    ])
}

/// Presentation whose slides hold the given `<p:spTree>` inner XML, in order
pub fn pptx_bytes(slides: &[&str]) -> Vec<u8> {
    let ids: String = (0..slides.len())
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 1))
        .collect();
    let rels: String = (0..slides.len())
        .map(|i| {
            format!(
                r#"<Relationship Id="rId{}" Target="slides/slide{}.xml"/>"#,
                i + 1,
                i + 1
            )
        })
        .collect();
    let presentation = format!(
        r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst>{}</p:sldIdLst></p:presentation>"#,
        ids
    );
    let presentation_rels = format!("<Relationships>{}</Relationships>", rels);
    let slide_docs: Vec<(String, String)> = slides
        .iter()
        .enumerate()
        .map(|(i, tree)| {
            (
                format!("ppt/slides/slide{}.xml", i + 1),
                format!(
                    r#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree>{}</p:spTree></p:cSld></p:sld>"#,
                    tree
                ),
            )
        })
        .collect();

    let mut parts: Vec<(&str, &str)> = vec![
        ("[Content_Types].xml", "<Types/>"),
        ("ppt/presentation.xml", &presentation),
        ("ppt/_rels/presentation.xml.rels", &presentation_rels),
    ];
    for (name, content) in &slide_docs {
        parts.push((name, content));
    }
    zip_package(&parts)
}

/// Text shape with one paragraph per entry
pub fn text_shape(paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", p))
        .collect();
    format!("<p:sp><p:txBody>{}</p:txBody></p:sp>", body)
}

/// Task translating `origin` into `target` with the chat provider
pub fn task(id: i64, origin: &Path, target: &Path) -> TaskConfig {
    TaskConfig {
        id,
        origin_filepath: origin.to_path_buf(),
        target_filepath: target.to_path_buf(),
        lang: "English".to_string(),
        output_type: "trans_only_inherit".to_string(),
        server: ProviderKind::OpenAI,
        model: "primary".to_string(),
        backup_model: Some("backup".to_string()),
        api_url: String::new(),
        api_key: "sk-test".to_string(),
        prompt: "Translate into {target_lang}:".to_string(),
        threads: Some(4),
        ..Default::default()
    }
}

/// Job settings with millisecond backoff and progress persisted on every step
pub fn fast_settings() -> JobSettings {
    JobSettings {
        retry: RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::from_millis(1),
            rate_limit_multiplier: 1,
        },
        progress: ProgressPolicy {
            step: 0.0,
            tail_start: 90.0,
            tail_step: 0.0,
        },
        ..JobSettings::default()
    }
}

/// Job runner over an in-memory store with a scripted provider
pub fn runner(store: Arc<MemoryTaskStore>, provider: Arc<dyn Provider>) -> JobRunner {
    init_logging();
    let store: Arc<dyn TaskStore> = store;
    JobRunner::new(store)
        .with_settings(fast_settings())
        .with_provider(provider)
}
