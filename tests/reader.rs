use pullxml::name::XML_NAMESPACE;
use pullxml::reader::{FileResolver, ReaderBuilder};
use pullxml::{Error, Node, NodeType, SyntaxError, XmlReader};

use pretty_assertions::assert_eq;
use regex::Regex;

fn describe(node: Node) -> String {
    match node {
        Node::StartDocument => "StartDocument".to_owned(),
        Node::EndDocument => "EndDocument".to_owned(),
        Node::DocType(dtd) => format!("DocType({})", dtd.root()),
        Node::EndDocType(_) => "EndDocType".to_owned(),
        Node::StartElement(e) => {
            let attrs: String = e
                .attributes()
                .iter()
                .map(|a| format!(" {}={}", a.name(), a.value()))
                .collect();
            format!("Start({}{})", e.name(), attrs)
        }
        Node::EndElement(e) => format!("End({})", e.name()),
        Node::Characters(t) if t.is_cdata() => format!("CData({})", t.content()),
        Node::Characters(t) if t.is_chunk() => format!("Chunk({})", t.content()),
        Node::Characters(t) => format!("Text({})", t.content()),
        Node::Comment(c) => format!("Comment({})", c),
        Node::ProcessingInstruction(pi) => format!("PI({}|{})", pi.target(), pi.data()),
        Node::EntityReference(name) => format!("Ref({})", name),
    }
}

fn read_all(reader: &mut XmlReader) -> Vec<String> {
    let mut nodes = Vec::new();
    loop {
        let node = reader.next().unwrap();
        let end = node.is_end_document();
        nodes.push(describe(node));
        if end {
            return nodes;
        }
    }
}

fn parse(builder: ReaderBuilder, xml: &str) -> Vec<String> {
    read_all(&mut builder.into_str_reader(xml))
}

fn syntax_error(builder: ReaderBuilder, xml: &str) -> SyntaxError {
    let mut reader = builder.into_str_reader(xml);
    loop {
        match reader.next() {
            Ok(Node::EndDocument) => panic!("Expected a syntax error in {:?}", xml),
            Ok(_) => {}
            Err(Error::Syntax(e)) => return e,
            Err(e) => panic!("Expected `Error::Syntax`, but got `{:?}`", e),
        }
    }
}

#[test]
fn test_basic() {
    let mut reader = XmlReader::from_str("<?xml version=\"1.0\"?>\n<r a=\"1\"><c/>text</r>");
    assert_eq!(
        read_all(&mut reader),
        vec![
            "Start(r a=1)",
            "Start(c)",
            "End(c)",
            "Text(text)",
            "End(r)",
            "EndDocument"
        ]
    );
    assert_eq!(reader.declaration().map(|d| d.version()), Some("1.0"));
}

#[test]
fn test_end_document_repeats() {
    let mut reader = XmlReader::from_str("<r/>");
    read_all(&mut reader);
    assert!(reader.next().unwrap().is_end_document());
    assert!(reader.next().unwrap().is_end_document());
}

#[test]
fn test_start_document_and_doctype() {
    let builder = ReaderBuilder::new()
        .report_start_document(true)
        .report_doc_type(true);
    assert_eq!(
        parse(builder, "<!DOCTYPE r [<!ELEMENT r ANY>]><r/>"),
        vec![
            "StartDocument",
            "DocType(r)",
            "EndDocType",
            "Start(r)",
            "End(r)",
            "EndDocument"
        ]
    );
}

#[test]
fn test_comments() {
    let xml = "<r><!-- c --></r>";
    assert_eq!(
        parse(ReaderBuilder::new(), xml),
        vec!["Start(r)", "End(r)", "EndDocument"]
    );
    assert_eq!(
        parse(ReaderBuilder::new().report_comments(true), xml),
        vec!["Start(r)", "Comment( c )", "End(r)", "EndDocument"]
    );
    let e = syntax_error(ReaderBuilder::new(), "<r><!-- a -- b --></r>");
    assert!(e.message().contains("--"), "{}", e);
}

#[test]
fn test_processing_instructions() {
    let xml = "<r><?pi some data?></r>";
    assert_eq!(
        parse(ReaderBuilder::new(), xml),
        vec!["Start(r)", "End(r)", "EndDocument"]
    );
    assert_eq!(
        parse(ReaderBuilder::new().report_processing_instructions(true), xml),
        vec!["Start(r)", "PI(pi|some data)", "End(r)", "EndDocument"]
    );
    let e = syntax_error(ReaderBuilder::new(), "<r><?xml version='1.0'?></r>");
    assert!(e.message().contains("XML declaration"), "{}", e);
}

#[test]
fn test_cdata() {
    let xml = "<r>a<![CDATA[<b>]]>c</r>";
    assert_eq!(
        parse(ReaderBuilder::new(), xml),
        vec!["Start(r)", "Text(a<b>c)", "End(r)", "EndDocument"]
    );
    assert_eq!(
        parse(ReaderBuilder::new().report_cdata(true), xml),
        vec![
            "Start(r)",
            "Text(a)",
            "CData(<b>)",
            "Text(c)",
            "End(r)",
            "EndDocument"
        ]
    );
    let e = syntax_error(ReaderBuilder::new(), "<r>a]]>b</r>");
    assert!(e.message().contains("]]>"), "{}", e);
}

#[test]
fn test_attribute_normalization() {
    let xml = r#"<!DOCTYPE r [<!ATTLIST r t NMTOKENS #IMPLIED c CDATA #IMPLIED>]><r t="  x   y " c=" x	y "/>"#;
    assert_eq!(
        parse(ReaderBuilder::new(), xml),
        vec!["Start(r t=x y c= x y )", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_attribute_defaults() {
    let xml = r#"<!DOCTYPE r [<!ATTLIST r a CDATA "x" b CDATA #FIXED "y" c CDATA #IMPLIED>]><r a="z"/>"#;
    let mut reader = XmlReader::from_str(xml);
    match reader.next().unwrap() {
        Node::StartElement(e) => {
            let attrs = e.attributes();
            assert_eq!(attrs.len(), 2);
            let a = attrs.find("a").unwrap();
            assert_eq!(a.value(), "z");
            assert!(!a.is_defaulted());
            let b = attrs.find("b").unwrap();
            assert_eq!(b.value(), "y");
            assert!(b.is_defaulted());
            assert!(attrs.find("c").is_none());
        }
        x => panic!("Expected `StartElement`, but got `{:?}`", x),
    }
}

#[test]
fn test_duplicate_attribute() {
    let e = syntax_error(ReaderBuilder::new(), r#"<r a="1" a="2"/>"#);
    assert_eq!(e.message(), "duplicate attribute a");
}

#[test]
fn test_entities() {
    let xml = r#"<!DOCTYPE r [<!ENTITY e "v&#65;l">]><r a="&e;">&e;&lt;&#x42;</r>"#;
    assert_eq!(
        parse(ReaderBuilder::new(), xml),
        vec!["Start(r a=vAl)", "Text(vAl<B)", "End(r)", "EndDocument"]
    );
    let reported = r#"<!DOCTYPE r [<!ENTITY e "v">]><r>&e;&amp;</r>"#;
    assert_eq!(
        parse(ReaderBuilder::new().report_entity_references(true), reported),
        vec!["Start(r)", "Ref(e)", "Text(&)", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_entity_with_markup() {
    let xml = r#"<!DOCTYPE r [<!ENTITY e "<b>x</b>">]><r>&e;</r>"#;
    assert_eq!(
        parse(ReaderBuilder::new(), xml),
        vec!["Start(r)", "Start(b)", "Text(x)", "End(b)", "End(r)", "EndDocument"]
    );
    let unbalanced = r#"<!DOCTYPE r [<!ENTITY e "<b>">]><r>&e;</b></r>"#;
    let e = syntax_error(ReaderBuilder::new(), unbalanced);
    assert!(e.message().contains("well-balanced"), "{}", e);
}

#[test]
fn test_undeclared_entity() {
    assert_eq!(
        parse(ReaderBuilder::new(), "<r>x&u;y</r>"),
        vec!["Start(r)", "Text(x)", "Ref(u)", "Text(y)", "End(r)", "EndDocument"]
    );
    let e = syntax_error(ReaderBuilder::new(), r#"<r a="&u;"/>"#);
    assert!(e.message().contains("undeclared entity"), "{}", e);
}

#[test]
fn test_invalid_char_reference() {
    let e = syntax_error(ReaderBuilder::new(), "<r>&#0;</r>");
    assert!(e.message().contains("invalid character reference"), "{}", e);
    let e = syntax_error(ReaderBuilder::new(), "<r>&#xD800;</r>");
    assert!(e.message().contains("invalid character reference"), "{}", e);
}

#[test]
fn test_self_referencing_entity() {
    let xml = r#"<!DOCTYPE r [<!ENTITY e "&e;">]><r>&e;</r>"#;
    let e = syntax_error(ReaderBuilder::new(), xml);
    assert!(e.message().contains("recursive"), "{}", e);

    let xml = r#"<!DOCTYPE r [<!ENTITY % p "%p;">]><r/>"#;
    let e = syntax_error(ReaderBuilder::new(), xml);
    assert_eq!(e.message(), "recursive reference to parameter entity %p;");
}

#[test]
fn test_recursive_entity() {
    let xml = r#"<!DOCTYPE r [<!ENTITY a "&b;"><!ENTITY b "&a;">]><r>&a;</r>"#;
    let e = syntax_error(ReaderBuilder::new(), xml);
    assert!(e.message().contains("recursive"), "{}", e);
}

#[test]
fn test_billion_laughs() {
    let xml = r#"<!DOCTYPE r [
<!ENTITY a "aaaaaaaaaa">
<!ENTITY b "&a;&a;&a;&a;&a;&a;&a;&a;&a;&a;">
<!ENTITY c "&b;&b;&b;&b;&b;&b;&b;&b;&b;&b;">
<!ENTITY d "&c;&c;&c;&c;&c;&c;&c;&c;&c;&c;">
<!ENTITY e "&d;&d;&d;&d;&d;&d;&d;&d;&d;&d;">
]>
<r>&e;</r>"#;
    let e = syntax_error(ReaderBuilder::new().max_size(10_000), xml);
    assert!(e.message().contains("maximum size"), "{}", e);
}

#[test]
fn test_max_input_depth() {
    let xml = r#"<!DOCTYPE r [<!ENTITY a "x"><!ENTITY b "&a;"><!ENTITY c "&b;">]><r>&c;</r>"#;
    let e = syntax_error(ReaderBuilder::new().max_input_depth(3), xml);
    assert!(e.message().contains("maximum input depth"), "{}", e);
    assert_eq!(
        parse(ReaderBuilder::new().max_input_depth(4), xml),
        vec!["Start(r)", "Text(x)", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_mismatched_end_tag() {
    let e = syntax_error(ReaderBuilder::new(), "<a>\n<b>\n</c>");
    assert_eq!(e.line(), 3);
    let pattern = Regex::new(r"^unmatched element b at line \d+$").unwrap();
    assert!(pattern.is_match(&e.to_string()), "{}", e);
}

#[test]
fn test_unexpected_end() {
    let e = syntax_error(ReaderBuilder::new(), "<r>\n<a>");
    assert_eq!(e.message(), "unexpected end of document");
    assert_eq!(e.line(), 2);
    let e = syntax_error(ReaderBuilder::new(), "  ");
    assert_eq!(e.message(), "no root element");
}

#[test]
fn test_content_after_root() {
    let e = syntax_error(ReaderBuilder::new(), "<r/>x");
    assert!(e.message().contains("after the root element"), "{}", e);
    let e = syntax_error(ReaderBuilder::new(), "<r/><s/>");
    assert!(e.message().contains("after the root element"), "{}", e);
}

#[test]
fn test_error_is_sticky() {
    let mut reader = XmlReader::from_str("<a></b><c/>");
    reader.next().unwrap();
    assert!(reader.next().is_err());
    assert!(reader.next().is_err());
}

#[test]
fn test_namespaces() {
    let xml = r#"<r xmlns="urn:d" xmlns:p="urn:p"><p:c p:a="1" b="2" xml:lang="en"/></r>"#;
    let mut reader = XmlReader::from_str(xml);
    match reader.next().unwrap() {
        Node::StartElement(e) => {
            assert_eq!(e.namespace(), "urn:d");
            assert!(e.attributes().is_empty());
            assert_eq!(e.namespace_mappings().len(), 2);
        }
        x => panic!("Expected `StartElement`, but got `{:?}`", x),
    }
    match reader.next().unwrap() {
        Node::StartElement(e) => {
            assert_eq!(e.namespace(), "urn:p");
            assert_eq!(e.local_name(), "c");
            let attrs = e.attributes();
            assert_eq!(attrs.find_ns("urn:p", "a").map(|a| a.value()), Some("1"));
            assert_eq!(attrs.find("b").map(|a| a.namespace()), Some(""));
            assert_eq!(attrs.find_ns(XML_NAMESPACE, "lang").map(|a| a.value()), Some("en"));
        }
        x => panic!("Expected `StartElement`, but got `{:?}`", x),
    }
    assert_eq!(reader.next().unwrap().node_type(), NodeType::EndElement);
    match reader.next().unwrap() {
        Node::EndElement(e) => {
            assert_eq!(e.namespace(), "urn:d");
            assert_eq!(e.namespace_mappings().len(), 2);
        }
        x => panic!("Expected `EndElement`, but got `{:?}`", x),
    }
    assert_eq!(reader.namespace_context().depth(), 0);
}

#[test]
fn test_namespace_errors() {
    let e = syntax_error(ReaderBuilder::new(), "<q:r/>");
    assert_eq!(e.message(), "undeclared namespace prefix q");
    let e = syntax_error(ReaderBuilder::new(), r#"<r xmlns:p=""/>"#);
    assert!(e.message().contains("empty namespace"), "{}", e);
    let e = syntax_error(ReaderBuilder::new(), r#"<r xmlns:xmlns="urn:x"/>"#);
    assert!(e.message().contains("xmlns"), "{}", e);
}

#[test]
fn test_chunks() {
    assert_eq!(
        parse(ReaderBuilder::new().chunk_size(4), "<r>abcdefghij</r>"),
        vec![
            "Start(r)",
            "Chunk(abcd)",
            "Chunk(efgh)",
            "Text(ij)",
            "End(r)",
            "EndDocument"
        ]
    );
}

#[test]
fn test_full_chunk_ends_run() {
    assert_eq!(
        parse(ReaderBuilder::new().chunk_size(4), "<r>abcd<s/>efg</r>"),
        vec![
            "Start(r)",
            "Text(abcd)",
            "Start(s)",
            "End(s)",
            "Text(efg)",
            "End(r)",
            "EndDocument"
        ]
    );
    assert_eq!(
        parse(ReaderBuilder::new().chunk_size(2), "<r>ab</r>"),
        vec!["Start(r)", "Text(ab)", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_chunk_boundary_inside_cdata_end() {
    // "]" is held back until it is known not to close the section
    assert_eq!(
        parse(ReaderBuilder::new().chunk_size(2), "<r><![CDATA[ab]x]]></r>"),
        vec!["Start(r)", "Chunk(ab)", "Text(]x)", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_feed_char_by_char() {
    let xml = r#"<!DOCTYPE r [<!ENTITY e "é">]><r a='1'>x&e;<![CDATA[y]]><s/></r>"#;
    let expected = parse(ReaderBuilder::new(), xml);

    let (mut reader, feeder) = ReaderBuilder::new().into_feed_reader();
    let mut nodes = Vec::new();
    for c in xml.chars() {
        feeder.feed(c.encode_utf8(&mut [0; 4]));
        while let Some(node) = reader.advance().unwrap() {
            nodes.push(describe(node));
        }
    }
    feeder.finish().unwrap();
    while let Some(node) = reader.advance().unwrap() {
        let end = node.is_end_document();
        nodes.push(describe(node));
        if end {
            break;
        }
    }
    assert_eq!(nodes, expected);
}

#[test]
fn test_line_numbers() {
    let mut reader = XmlReader::from_str("<r>\r\n<a/>\n\n<b/></r>");
    reader.next().unwrap();
    reader.next().unwrap();
    assert_eq!(reader.line(), 2);
    reader.next().unwrap();
    reader.next().unwrap();
    reader.next().unwrap();
    assert_eq!(reader.line(), 4);
}

#[test]
fn test_external_subset_from_file() {
    let base = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/documents");
    let mut reader = ReaderBuilder::new()
        .resolver(FileResolver::new(base))
        .into_file_reader(format!("{}/external.xml", base))
        .unwrap();
    assert_eq!(
        read_all(&mut reader),
        vec![
            "Start(doc)",
            "Start(item kind=plain)",
            "End(item)",
            "Text((c) pullxml draft)",
            "End(doc)",
            "EndDocument"
        ]
    );
    assert_eq!(reader.dtd().system_id(), Some("external.dtd"));
}

#[test]
fn test_sample_document() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/documents/sample.xml");
    let mut reader = XmlReader::from_file(path).unwrap();
    let mut titles = Vec::new();
    let mut in_title = false;
    loop {
        match reader.next().unwrap() {
            Node::StartElement(e) => in_title = e.local_name() == "title",
            Node::Characters(t) if in_title => titles.push(t.content().to_owned()),
            Node::EndElement(_) => in_title = false,
            Node::EndDocument => break,
            _ => {}
        }
    }
    assert_eq!(titles, vec!["News from example.org", "First", "Second"]);
}
