use pullxml::dtd::{AttributeType, ContentModel, DefaultMode};
use pullxml::reader::{MemoryResolver, ReaderBuilder};
use pullxml::{Error, Node, QName, SyntaxError, XmlReader};

use pretty_assertions::assert_eq;

fn describe(node: Node) -> String {
    match node {
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
        Node::Characters(t) => format!("Text({})", t.content()),
        Node::EntityReference(name) => format!("Ref({})", name),
        Node::EndDocument => "EndDocument".to_owned(),
        x => format!("{:?}", x.node_type()),
    }
}

fn parse(builder: ReaderBuilder, xml: &str) -> Vec<String> {
    let mut reader = builder.into_str_reader(xml);
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

/// Reads up to the root start tag and returns the budget in use there.
fn used_at_root(xml: &str) -> usize {
    let mut reader = XmlReader::from_str(xml);
    match reader.next().unwrap() {
        Node::StartElement(_) => {}
        x => panic!("Expected `StartElement`, but got `{:?}`", x),
    }
    reader.used_size()
}

#[test]
fn test_doctype_reported() {
    let builder = ReaderBuilder::new().report_doc_type(true);
    let mut reader = builder.into_str_reader(r#"<!DOCTYPE r PUBLIC "-//X//DTD R//EN" "none.dtd"><r/>"#);
    match reader.next().unwrap() {
        Node::DocType(dtd) => {
            assert_eq!(dtd.root().as_str(), "r");
            assert_eq!(dtd.public_id(), Some("-//X//DTD R//EN"));
            assert_eq!(dtd.system_id(), Some("none.dtd"));
        }
        x => panic!("Expected `DocType`, but got `{:?}`", x),
    }
    assert_eq!(describe(reader.next().unwrap()), "EndDocType");
    assert_eq!(describe(reader.next().unwrap()), "Start(r)");
}

#[test]
fn test_element_declarations() {
    let xml = "<!DOCTYPE r [
<!ELEMENT r (#PCDATA|b)*>
<!ELEMENT b EMPTY>
<!ELEMENT c (b, (d | e)+)?>
]><r/>";
    let mut reader = XmlReader::from_str(xml);
    reader.next().unwrap();
    let dtd = reader.dtd();
    assert_eq!(dtd.element("r"), Some(&ContentModel::Mixed(vec![QName::new("b")])));
    assert_eq!(dtd.element("b"), Some(&ContentModel::Empty));
    assert!(matches!(dtd.element("c"), Some(ContentModel::Children(_))));
    assert!(dtd.element("d").is_none());
}

#[test]
fn test_invalid_content_model() {
    let e = syntax_error(ReaderBuilder::new(), "<!DOCTYPE r [<!ELEMENT r (a,b|c)>]><r/>");
    assert!(e.message().starts_with("invalid content model"), "{}", e);
}

#[test]
fn test_duplicate_element() {
    let xml = "<!DOCTYPE r [<!ELEMENT r ANY><!ELEMENT r EMPTY>]><r/>";
    let e = syntax_error(ReaderBuilder::new(), xml);
    assert_eq!(e.message(), "duplicate declaration of element r");
}

#[test]
fn test_attribute_declarations() {
    let xml = r#"<!DOCTYPE r [
<!ATTLIST r
    id ID #REQUIRED
    kind (big|small) "small"
    v CDATA #FIXED "1">
<!ATTLIST r kind CDATA "other">
]><r id="x"/>"#;
    let mut reader = XmlReader::from_str(xml);
    assert_eq!(describe(reader.next().unwrap()), "Start(r id=x kind=small v=1)");
    let dtd = reader.dtd();
    let kind = dtd.attribute("r", "kind").unwrap();
    assert_eq!(
        kind.attribute_type(),
        &AttributeType::Enumeration(vec!["big".to_owned(), "small".to_owned()])
    );
    assert_eq!(kind.mode(), DefaultMode::Default);
    assert_eq!(dtd.attribute("r", "id").map(|a| a.mode()), Some(DefaultMode::Required));
    assert_eq!(dtd.attribute("r", "v").map(|a| a.mode()), Some(DefaultMode::Fixed));
    assert_eq!(dtd.attributes("r").len(), 3);
}

#[test]
fn test_duplicate_declarations_are_refunded() {
    let single = used_at_root(r#"<!DOCTYPE r [<!ENTITY e "v">]><r></r>"#);
    let double = used_at_root(r#"<!DOCTYPE r [<!ENTITY e "v"><!ENTITY e "w">]><r></r>"#);
    assert_eq!(single, double);

    // only the separating whitespace stays charged
    let single = used_at_root(r#"<!DOCTYPE r [<!ATTLIST r a CDATA "x">]><r></r>"#);
    let double = used_at_root(r#"<!DOCTYPE r [<!ATTLIST r a CDATA "x" a CDATA "y">]><r></r>"#);
    assert_eq!(double, single + 1);

    let single = used_at_root(r#"<!DOCTYPE r [<!ATTLIST r a CDATA #IMPLIED>]><r></r>"#);
    let double =
        used_at_root(r#"<!DOCTYPE r [<!ATTLIST r a CDATA #IMPLIED a CDATA #IMPLIED>]><r></r>"#);
    assert_eq!(double, single + 1);
}

#[test]
fn test_first_entity_wins() {
    let xml = r#"<!DOCTYPE r [<!ENTITY e "first"><!ENTITY e "second">]><r>&e;</r>"#;
    assert_eq!(
        parse(ReaderBuilder::new(), xml),
        vec!["Start(r)", "Text(first)", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_parameter_entity_declarations() {
    let xml = r#"<!DOCTYPE r [
<!ENTITY % decl '<!ENTITY e "pe">'>
%decl;
]><r>&e;</r>"#;
    assert_eq!(
        parse(ReaderBuilder::new(), xml),
        vec!["Start(r)", "Text(pe)", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_parameter_entity_in_entity_value() {
    let xml = r#"<!DOCTYPE r [
<!ENTITY % name "world">
<!ENTITY greeting "hello %name;">
]><r>&greeting;</r>"#;
    assert_eq!(
        parse(ReaderBuilder::new(), xml),
        vec!["Start(r)", "Text(hello world)", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_undeclared_parameter_entity() {
    let e = syntax_error(ReaderBuilder::new(), "<!DOCTYPE r [%u;]><r/>");
    assert_eq!(e.message(), "undeclared parameter entity %u;");
}

#[test]
fn test_conditional_sections_in_internal_subset() {
    let e = syntax_error(ReaderBuilder::new(), "<!DOCTYPE r [<![INCLUDE[]]>]><r/>");
    assert!(e.message().contains("conditional sections"), "{}", e);
}

#[test]
fn test_external_subset_from_memory() {
    let resolver = MemoryResolver::new().with(
        "ext.dtd",
        "<!ENTITY % on 'INCLUDE'>
<![%on;[<!ENTITY t 'included'>]]>
<![IGNORE[<!ENTITY t 'ignored'> <![INCLUDE[ ]]>
<!ENTITY u 'after'>",
    );
    let builder = ReaderBuilder::new().resolver(resolver);
    assert_eq!(
        parse(builder, r#"<!DOCTYPE r SYSTEM "ext.dtd"><r>&t; &u;</r>"#),
        vec!["Start(r)", "Text(included after)", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_include_inside_external_parameter_entity() {
    let resolver = MemoryResolver::new().with(
        "mod.dtd",
        "<?xml encoding='UTF-8'?>
<!ENTITY % on 'INCLUDE'>
<![ %on; [
<!-- nested -->
<!ENTITY deep 'nested'>
<![IGNORE[ <!ENTITY deep 'ignored'> ]]>
]]>",
    );
    let xml = r#"<!DOCTYPE r [<!ENTITY % mod SYSTEM "mod.dtd"> %mod; <!ENTITY after 'ok'>]><r>&deep; &after;</r>"#;
    assert_eq!(
        parse(ReaderBuilder::new().resolver(resolver), xml),
        vec!["Start(r)", "Text(nested ok)", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_internal_subset_comes_first() {
    let resolver = MemoryResolver::new().with("ext.dtd", "<!ENTITY t 'external'>");
    let builder = ReaderBuilder::new().resolver(resolver);
    let xml = r#"<!DOCTYPE r SYSTEM "ext.dtd" [<!ENTITY t 'internal'>]><r>&t;</r>"#;
    assert_eq!(
        parse(builder, xml),
        vec!["Start(r)", "Text(internal)", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_unresolved_external_subset_is_skipped() {
    assert_eq!(
        parse(ReaderBuilder::new(), r#"<!DOCTYPE r SYSTEM "missing.dtd"><r/>"#),
        vec!["Start(r)", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_external_entity() {
    let xml = r#"<!DOCTYPE r [<!ENTITY chapter SYSTEM "chapter.xml">]><r>&chapter;</r>"#;
    let resolver = MemoryResolver::new().with("chapter.xml", "<?xml encoding='UTF-8'?><c>text</c>");
    assert_eq!(
        parse(ReaderBuilder::new().resolver(resolver), xml),
        vec!["Start(r)", "Start(c)", "Text(text)", "End(c)", "End(r)", "EndDocument"]
    );
    assert_eq!(
        parse(ReaderBuilder::new(), xml),
        vec!["Start(r)", "Ref(chapter)", "End(r)", "EndDocument"]
    );
}

#[test]
fn test_unparsed_entity() {
    let xml = r#"<!DOCTYPE r [
<!NOTATION gif SYSTEM "image/gif">
<!NOTATION jpeg PUBLIC "-//X//NOTATION JPEG//EN">
<!ENTITY pic SYSTEM "pic.gif" NDATA gif>
]><r>&pic;</r>"#;
    let mut reader = XmlReader::from_str(xml);
    assert_eq!(describe(reader.next().unwrap()), "Start(r)");
    assert_eq!(describe(reader.next().unwrap()), "Ref(pic)");

    let dtd = reader.dtd();
    let pic = dtd.entity("pic").unwrap();
    assert!(pic.is_unparsed());
    assert_eq!(pic.notation(), Some("gif"));
    assert_eq!(dtd.notation("gif").and_then(|n| n.system_id()), Some("image/gif"));
    let jpeg = dtd.notation("jpeg").unwrap();
    assert_eq!(jpeg.public_id(), Some("-//X//NOTATION JPEG//EN"));
    assert_eq!(jpeg.system_id(), None);

    let e = syntax_error(
        ReaderBuilder::new(),
        r#"<!DOCTYPE r [<!NOTATION gif SYSTEM "g"><!ENTITY pic SYSTEM "p" NDATA gif>]><r a="&pic;"/>"#,
    );
    assert!(e.message().contains("unparsed entity"), "{}", e);
}

#[test]
fn test_comments_in_dtd_are_not_reported() {
    let builder = ReaderBuilder::new()
        .report_comments(true)
        .report_processing_instructions(true);
    assert_eq!(
        parse(builder, "<!DOCTYPE r [<!-- c --><?pi x?>]><r/>"),
        vec!["Start(r)", "End(r)", "EndDocument"]
    );
}
