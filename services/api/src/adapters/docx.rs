//! services/api/src/adapters/docx.rs
//!
//! This module contains the document assembler adapter. It implements the
//! `DocumentAssembler` port by building WordprocessingML in memory and packaging
//! it as a `.docx` archive with the `zip` crate.

use async_trait::async_trait;
use docgen_core::ports::{AssemblySession, DocumentAssembler, PortError, PortResult};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::{debug, warn};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Word's own default margins, in twentieths of a point.
const DEFAULT_MARGINS: Margins = Margins { top: 1440, bottom: 1440, left: 1800, right: 1800 };
/// One inch on every side.
const STYLED_MARGINS: Margins = Margins { top: 1440, bottom: 1440, left: 1440, right: 1440 };

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

/// Normal text in Times New Roman 12pt, bold headings at 16/14/12pt, and a
/// bordered table style.
const DEFAULT_STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Times New Roman" w:hAnsi="Times New Roman" w:cs="Times New Roman" w:eastAsia="SimSun"/><w:sz w:val="24"/><w:szCs w:val="24"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="120" w:line="360" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/><w:szCs w:val="32"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="200" w:after="100"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:sz w:val="28"/><w:szCs w:val="28"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="160" w:after="80"/><w:outlineLvl w:val="2"/></w:pPr><w:rPr><w:b/><w:sz w:val="24"/><w:szCs w:val="24"/></w:rPr></w:style><w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr></w:style></w:styles>"#;

#[derive(Debug, Clone, Copy)]
struct Margins {
    top: u32,
    bottom: u32,
    left: u32,
    right: u32,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `DocumentAssembler` port by writing `.docx` files.
#[derive(Clone, Default)]
pub struct DocxAssembler;

impl DocxAssembler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentAssembler for DocxAssembler {
    async fn open_session(&self) -> PortResult<Box<dyn AssemblySession>> {
        Ok(Box::new(DocxSession { document: None }))
    }
}

//=========================================================================================
// Session
//=========================================================================================

/// One document under construction. Nothing touches the disk until `save`.
struct DocxSession {
    document: Option<DocxDocument>,
}

struct DocxDocument {
    styles_xml: String,
    margins: Margins,
    body: String,
}

impl DocxSession {
    fn document(&mut self) -> PortResult<&mut DocxDocument> {
        self.document.as_mut().ok_or_else(|| {
            PortError::Unexpected("No document has been created in this session".to_string())
        })
    }
}

#[async_trait]
impl AssemblySession for DocxSession {
    async fn create_document(&mut self, template: Option<&Path>) -> PortResult<()> {
        let styles_xml = match template {
            Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| PortError::Unexpected(format!("Failed to read template: {}", e)))?;
                debug!(template = %path.display(), "Using template styles");
                read_template_styles(bytes)?
            }
            Some(path) => {
                warn!(template = %path.display(), "Template file missing, using built-in styles");
                DEFAULT_STYLES_XML.to_string()
            }
            None => DEFAULT_STYLES_XML.to_string(),
        };
        self.document = Some(DocxDocument {
            styles_xml,
            margins: DEFAULT_MARGINS,
            body: String::new(),
        });
        Ok(())
    }

    async fn apply_document_styles(&mut self) -> PortResult<()> {
        self.document()?.margins = STYLED_MARGINS;
        Ok(())
    }

    async fn insert_heading(&mut self, text: &str, level: u8) -> PortResult<()> {
        let level = level.clamp(1, 3);
        let doc = self.document()?;
        doc.body.push_str(&format!(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading{}"/></w:pPr>{}</w:p>"#,
            level,
            run(text)
        ));
        Ok(())
    }

    async fn insert_paragraph(&mut self, text: &str) -> PortResult<()> {
        let doc = self.document()?;
        for line in text.lines() {
            doc.body.push_str(&format!("<w:p>{}</w:p>", run(line)));
        }
        Ok(())
    }

    async fn insert_table(&mut self, rows: &[Vec<String>]) -> PortResult<()> {
        let doc = self.document()?;
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        if cols == 0 {
            return Ok(());
        }

        let mut xml = String::from(
            r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0" w:type="auto"/></w:tblPr><w:tblGrid>"#,
        );
        for _ in 0..cols {
            xml.push_str("<w:gridCol/>");
        }
        xml.push_str("</w:tblGrid>");
        for row in rows {
            xml.push_str("<w:tr>");
            for i in 0..cols {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                xml.push_str(&format!("<w:tc><w:p>{}</w:p></w:tc>", run(cell)));
            }
            xml.push_str("</w:tr>");
        }
        // A paragraph must follow a table or adjacent tables merge.
        xml.push_str("</w:tbl><w:p/>");

        doc.body.push_str(&xml);
        Ok(())
    }

    async fn save(&mut self, path: &Path) -> PortResult<u64> {
        let doc = self.document()?;
        let archive = package(doc)
            .map_err(|e| PortError::Unexpected(format!("Failed to build document: {}", e)))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(format!("Failed to save document: {}", e)))?;
        }
        tokio::fs::write(path, &archive)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to save document: {}", e)))?;

        Ok(archive.len() as u64)
    }

    async fn close(self: Box<Self>) -> PortResult<()> {
        // Dropping the buffered document releases everything the session holds.
        Ok(())
    }
}

//=========================================================================================
// WordprocessingML Helpers
//=========================================================================================

fn run(text: &str) -> String {
    format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, escape_xml(text))
}

/// Escapes markup characters and drops control characters XML cannot carry.
fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

fn document_xml(doc: &DocxDocument) -> String {
    let m = doc.margins;
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}"><w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="{}" w:right="{}" w:bottom="{}" w:left="{}" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
        doc.body, m.top, m.right, m.bottom, m.left
    )
}

fn package(doc: &DocxDocument) -> zip::result::ZipResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let document = document_xml(doc);

    let parts: [(&str, &str); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", ROOT_RELS_XML),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML),
        ("word/styles.xml", &doc.styles_xml),
        ("word/document.xml", &document),
    ];
    for (name, content) in parts {
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

fn read_template_styles(bytes: Vec<u8>) -> PortResult<String> {
    let invalid = |e: zip::result::ZipError| {
        PortError::Unexpected(format!("Template is not a valid .docx: {}", e))
    };
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(invalid)?;
    let mut styles = String::new();
    archive
        .by_name("word/styles.xml")
        .map_err(invalid)?
        .read_to_string(&mut styles)
        .map_err(|e| PortError::Unexpected(format!("Failed to read template styles: {}", e)))?;
    Ok(styles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_part(path: &Path, name: &str) -> String {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = ZipArchive::new(file).unwrap();
        let mut out = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn writes_a_complete_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents").join("out.docx");

        let mut session = DocxAssembler::new().open_session().await.unwrap();
        session.create_document(None).await.unwrap();
        session.apply_document_styles().await.unwrap();
        session.insert_heading("1. Introduction", 1).await.unwrap();
        session.insert_paragraph("Yields & <risks>").await.unwrap();
        session
            .insert_table(&[
                vec!["Year".to_string(), "Yield".to_string()],
                vec!["2020".to_string()],
            ])
            .await
            .unwrap();
        let written = session.save(&path).await.unwrap();
        session.close().await.unwrap();

        assert_eq!(written, std::fs::metadata(&path).unwrap().len());
        let document = read_part(&path, "word/document.xml");
        assert!(document.contains(r#"<w:pStyle w:val="Heading1"/>"#));
        assert!(document.contains("Yields &amp; &lt;risks&gt;"));
        assert!(document.contains("<w:tbl>"));
        assert_eq!(document.matches("<w:tc>").count(), 4);
        assert!(document.contains(r#"w:left="1440""#));
        assert!(read_part(&path, "word/styles.xml").contains("Times New Roman"));
        assert!(read_part(&path, "[Content_Types].xml").contains("/word/document.xml"));
    }

    #[tokio::test]
    async fn unstyled_document_keeps_default_margins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.docx");

        let mut session = DocxAssembler::new().open_session().await.unwrap();
        session.create_document(None).await.unwrap();
        session.insert_paragraph("text").await.unwrap();
        session.save(&path).await.unwrap();

        assert!(read_part(&path, "word/document.xml").contains(r#"w:left="1800""#));
    }

    #[tokio::test]
    async fn insert_before_create_is_rejected() {
        let mut session = DocxAssembler::new().open_session().await.unwrap();
        let err = session.insert_heading("Abstract", 1).await.unwrap_err();
        assert!(err.to_string().contains("No document has been created"));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn template_styles_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.docx");
        let mut zip = ZipWriter::new(std::fs::File::create(&template).unwrap());
        zip.start_file("word/styles.xml", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<w:styles><!-- house style --></w:styles>").unwrap();
        zip.finish().unwrap();

        let out = dir.path().join("out.docx");
        let mut session = DocxAssembler::new().open_session().await.unwrap();
        session.create_document(Some(&template)).await.unwrap();
        session.save(&out).await.unwrap();

        assert!(read_part(&out, "word/styles.xml").contains("house style"));
    }

    #[tokio::test]
    async fn missing_template_falls_back_to_builtin_styles() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.docx");
        let mut session = DocxAssembler::new().open_session().await.unwrap();
        session
            .create_document(Some(&dir.path().join("nope.docx")))
            .await
            .unwrap();
        session.save(&out).await.unwrap();

        assert!(read_part(&out, "word/styles.xml").contains("Heading1"));
    }

    #[test]
    fn control_characters_are_dropped() {
        assert_eq!(escape_xml("a\u{0}b\u{7}c"), "abc");
        assert_eq!(escape_xml("\"q\" 'a'"), "&quot;q&quot; &apos;a&apos;");
    }
}
