use super::*;

fn page(text: &str) -> PageText {
    PageText {
        source_file: "pdfs/mission_report.pdf".to_string(),
        page_number: 3,
        text: text.to_string(),
    }
}

fn small_config() -> ChunkingConfig {
    ChunkingConfig {
        chunk_size: 10,
        chunk_overlap: 3,
    }
}

#[test]
fn default_config() {
    let config = ChunkingConfig::default();
    assert_eq!(config.chunk_size, 2000);
    assert_eq!(config.chunk_overlap, 200);
    assert_eq!(config.step(), 1800);
}

#[test]
fn windows_overlap_exactly() {
    let text = "abcdefghijklmnopqrstuvwxyz";
    let windows = split_text(text, &small_config()).expect("split should succeed");

    assert_eq!(
        windows,
        vec!["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxyz"]
    );
    for pair in windows.windows(2) {
        let tail: String = pair[0].chars().skip(7).collect();
        let head: String = pair[1].chars().take(3).collect();
        assert_eq!(tail, head);
    }
}

#[test]
fn short_text_is_single_chunk() {
    let windows = split_text("Apollo", &small_config()).expect("split should succeed");
    assert_eq!(windows, vec!["Apollo"]);
}

#[test]
fn text_of_exact_window_length_is_single_chunk() {
    let windows = split_text("0123456789", &small_config()).expect("split should succeed");
    assert_eq!(windows, vec!["0123456789"]);
}

#[test]
fn windows_respect_char_boundaries() {
    let text = "ééééééééééééééé";
    let windows = split_text(text, &small_config()).expect("split should succeed");

    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0].chars().count(), 10);
    assert_eq!(windows[1].chars().count(), 8);
}

#[test]
fn invalid_overlap_is_rejected() {
    let config = ChunkingConfig {
        chunk_size: 10,
        chunk_overlap: 10,
    };
    assert!(split_text("anything", &config).is_err());

    let config = ChunkingConfig {
        chunk_size: 0,
        chunk_overlap: 0,
    };
    assert!(split_text("anything", &config).is_err());
}

#[test]
fn chunks_carry_page_metadata() {
    let chunks = chunk_page(&page("abcdefghijklmnopqrstuvwxyz"), &small_config())
        .expect("chunking should succeed");

    assert_eq!(chunks.len(), 4);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.source_file, "pdfs/mission_report.pdf");
        assert_eq!(chunk.page_number, 3);
        assert_eq!(chunk.chunk_index, i);
    }
}

#[test]
fn blank_page_yields_no_chunks() {
    let chunks = chunk_page(&page("   \n\t  "), &small_config()).expect("chunking should succeed");
    assert!(chunks.is_empty());
}

#[test]
fn page_without_source_is_rejected() {
    let mut orphan = page("some text");
    orphan.source_file = String::new();
    assert!(chunk_page(&orphan, &small_config()).is_err());

    let mut unnumbered = page("some text");
    unnumbered.page_number = 0;
    assert!(chunk_page(&unnumbered, &small_config()).is_err());
}

#[test]
fn chunk_pages_never_spans_pages() {
    let pages = vec![
        PageText {
            source_file: "a.pdf".to_string(),
            page_number: 1,
            text: "first page text".to_string(),
        },
        PageText {
            source_file: "a.pdf".to_string(),
            page_number: 2,
            text: "second".to_string(),
        },
    ];

    let chunks = chunk_pages(&pages, &small_config()).expect("chunking should succeed");

    assert_eq!(chunks.len(), 3);
    assert!(chunks[..2].iter().all(|c| c.page_number == 1));
    assert_eq!(chunks[2].page_number, 2);
    assert_eq!(chunks[2].text, "second");
    assert_eq!(chunks[2].chunk_index, 0);
}
