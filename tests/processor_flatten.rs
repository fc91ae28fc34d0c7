use plaza_traffic::contract::SkipReason;
use plaza_traffic::error::MarkupError;
use plaza_traffic::preprocess::{flatten, flatten_or_skip, parse_document, validate_markup};

const ONE_DAY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PLAZA_TRAFFIC>
  <DAY date="2016-09-12" plaza_id="1">
    <HOUR time="00:00" direction="I" count="5"/>
    <HOUR time="01:00" direction="I" count="7"/>
  </DAY>
</PLAZA_TRAFFIC>"#;

#[test]
fn test_flatten_merges_day_attributes_into_every_child_row() {
    let rows = flatten(ONE_DAY).expect("Should parse");

    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.get("date"), Some("2016-09-12"));
        assert_eq!(row.get("plaza_id"), Some("1"));
    }
    assert_eq!(rows[0].get("time"), Some("00:00"));
    assert_eq!(rows[1].get("count"), Some("7"));
    assert_eq!(
        rows[0].keys().collect::<Vec<_>>(),
        vec!["date", "plaza_id", "time", "direction", "count"]
    );
}

#[test]
fn test_flatten_child_attribute_wins_on_collision() {
    let xml = r#"<ROOT><DAY date="2016-09-12" plaza_id="1"><HOUR plaza_id="4" count="2"/></DAY></ROOT>"#;
    let rows = flatten(xml).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("plaza_id"), Some("4"));
}

#[test]
fn test_flatten_keeps_document_order_across_days() {
    let xml = r#"<ROOT>
        <DAY date="d1"><HOUR n="1"/><HOUR n="2"/></DAY>
        <DAY date="d2"/>
        <DAY date="d3"><HOUR n="3"/></DAY>
    </ROOT>"#;
    let rows = flatten(xml).unwrap();
    let order: Vec<_> = rows
        .iter()
        .map(|r| (r.get("date").unwrap(), r.get("n").unwrap()))
        .collect();
    assert_eq!(order, vec![("d1", "1"), ("d1", "2"), ("d3", "3")]);
}

#[test]
fn test_flatten_ignores_root_attributes_text_and_deeper_elements() {
    let xml = r#"<ROOT generated="today">
        some text
        <DAY date="d1">
            <HOUR n="1"><NOTE kind="x"/></HOUR>
        </DAY>
    </ROOT>"#;
    let rows = flatten(xml).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("generated"), None);
    assert_eq!(rows[0].get("kind"), None);
    assert_eq!(rows[0].len(), 2);
}

#[test]
fn test_attribute_entities_are_unescaped() {
    let rows = flatten(r#"<R><D facility="Bronx &amp; Whitestone"><H c="1"/></D></R>"#).unwrap();
    assert_eq!(rows[0].get("facility"), Some("Bronx & Whitestone"));
}

#[test]
fn test_parsed_document_has_one_row_per_child_record() {
    let doc = parse_document(ONE_DAY).unwrap();
    assert_eq!(doc.root, "PLAZA_TRAFFIC");
    assert_eq!(doc.days.len(), 1);
    assert_eq!(doc.days[0].children.len(), flatten(ONE_DAY).unwrap().len());
}

#[test]
fn test_escaped_text_inside_records_is_accepted() {
    let xml = r#"<R><D a="1">Bronx &amp; Whitestone &#x41;<H c="2">&lt;ok&gt;</H></D></R>"#;
    assert!(validate_markup(xml).is_ok());
    assert_eq!(flatten(xml).unwrap().len(), 1);
}

#[test]
fn test_malformed_documents_are_rejected() {
    struct TestCase {
        name: &'static str,
        input: &'static str,
    }
    let cases = vec![
        TestCase { name: "empty", input: "" },
        TestCase { name: "html page", input: "<html><body><p>Not found</body></html>" },
        TestCase { name: "plain text", input: "Service unavailable" },
        TestCase { name: "mismatched end tag", input: "<R><D></X></R>" },
        TestCase { name: "two roots", input: "<R/><R/>" },
        TestCase { name: "text after root", input: "<R/>trailing" },
        TestCase { name: "duplicate attribute", input: r#"<R><D a="1" a="2"/></R>"# },
        TestCase { name: "unquoted attribute", input: "<R><D a=1/></R>" },
        TestCase { name: "truncated", input: "<R><D date=\"x\"><H" },
        TestCase { name: "unknown entity in text", input: r#"<R><D a="1">&bogus;</D></R>"# },
        TestCase { name: "bare ampersand in text", input: r#"<R><D a="1">AT&T</D></R>"# },
        TestCase { name: "less-than in attribute value", input: r#"<R><D a="<"/></R>"# },
        TestCase { name: "element name starting with digit", input: "<R><1D/></R>" },
        TestCase { name: "attribute name starting with digit", input: r#"<R><D 1a="x"/></R>"# },
    ];
    for tc in cases {
        assert!(validate_markup(tc.input).is_err(), "{}: should be rejected", tc.name);
    }
}

#[test]
fn test_specific_structural_errors() {
    assert_eq!(parse_document("   "), Err(MarkupError::NoRootElement));
    assert_eq!(
        parse_document("<A></A><B/>"),
        Err(MarkupError::MultipleRoots { element: "B".into() })
    );
    assert!(matches!(
        parse_document("<A/>oops"),
        Err(MarkupError::TextOutsideRoot { .. })
    ));
    assert!(matches!(
        parse_document("<R><1D/></R>"),
        Err(MarkupError::InvalidName { name, .. }) if name == "1D"
    ));
    assert!(matches!(
        parse_document(r#"<R><D a="<"/></R>"#),
        Err(MarkupError::Attribute { element, .. }) if element == "D"
    ));
}

#[test]
fn test_flatten_or_skip_reports_bad_payload_as_skipped_item() {
    let skipped = flatten_or_skip("day2.xml", "<not><valid>xml").unwrap_err();
    assert_eq!(skipped.link, "day2.xml");
    assert!(matches!(skipped.reason, SkipReason::InvalidMarkup(_)));
    assert_eq!(flatten_or_skip("day1.xml", ONE_DAY).map(|r| r.len()).ok(), Some(2));
}
