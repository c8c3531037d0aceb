use super::*;
use crate::parse::{find_components, parse_source};
use crate::security::PatternValidator;
use crate::validate::ERR_UNKNOWN_TAG;

fn component(src: &str) -> SourceElement {
    let nodes = parse_source(src).unwrap();
    find_components(&nodes).remove(0)
}

fn compile_with(src: &str, options: &CompileOptions) -> CompiledComponent {
    compile_component(&component(src), options, &PatternValidator)
}

#[test]
fn test_metadata_from_attributes() {
    let el = component(
        r#"<component name="user-card" props="userId, label" observed="Mode" shadow="closed"></component>"#,
    );
    let meta = read_metadata(&el, &CompileOptions::default()).unwrap();
    assert_eq!(meta.tag_name, "user-card");
    assert_eq!(meta.class_name, "UserCard");
    assert_eq!(meta.shadow, ShadowMode::Closed);
    assert_eq!(meta.props, vec!["userId".to_string(), "label".to_string()]);
    assert_eq!(meta.observed_attributes, vec!["mode".to_string()]);
    assert_eq!(meta.seeded_props(), vec!["userId", "label", "mode"]);
}

#[test]
fn test_default_shadow_comes_from_options() {
    let el = component(r#"<component name="x-plain"></component>"#);
    let options = CompileOptions {
        default_shadow: ShadowMode::None,
        ..CompileOptions::default()
    };
    assert_eq!(read_metadata(&el, &options).unwrap().shadow, ShadowMode::None);
}

#[test]
fn test_seeded_props_skip_duplicates() {
    let el = component(r#"<component name="x-dup" props="mode" observed="mode"></component>"#);
    let meta = read_metadata(&el, &CompileOptions::default()).unwrap();
    assert_eq!(meta.seeded_props(), vec!["mode"]);
}

#[test]
fn test_invalid_metadata() {
    let options = CompileOptions::default();
    let cases = [
        (r#"<component></component>"#, ERR_MISSING_ATTRIBUTE),
        (r#"<component name="card"></component>"#, ERR_INVALID_COMPONENT),
        (r#"<component name="font-face"></component>"#, ERR_INVALID_COMPONENT),
        (r#"<component name="x-a" shadow="sideways"></component>"#, ERR_INVALID_COMPONENT),
        (r#"<component name="x-a" props="ok, 2bad"></component>"#, ERR_INVALID_IDENTIFIER),
    ];
    for (src, code) in cases {
        let err = read_metadata(&component(src), &options).unwrap_err();
        assert_eq!(err.code, code, "{}", src);
    }
}

#[test]
fn test_unusable_metadata_is_not_emitted() {
    let unit = compile_with(r#"<component name="card"><p>x</p></component>"#, &CompileOptions::lenient());
    assert!(unit.metadata.is_none());
    assert!(!unit.is_emittable(&CompileOptions::lenient()));
    assert_eq!(unit.diagnostics.errors[0].context.as_deref(), Some("<component>"));
}

#[test]
fn test_component_body_compiles() {
    let unit = compile_with(
        r#"<component name="x-count"><var name="n" value="0"></var><p>{{ this.n }}</p></component>"#,
        &CompileOptions::default(),
    );
    assert!(unit.diagnostics.errors.is_empty());
    assert!(unit.is_emittable(&CompileOptions::default()));
    assert_eq!(unit.ir.template_nodes.len(), 1);
    assert_eq!(unit.ir.directives.len(), 1);
}

#[test]
fn test_strict_errors_block_emission() {
    let src = r#"<component name="x-a"><p>ok</p><blink></blink><p>after</p></component>"#;

    let strict = CompileOptions::default();
    let unit = compile_with(src, &strict);
    assert!(!unit.is_emittable(&strict));
    assert_eq!(unit.ir.template_nodes.len(), 1);

    let lenient = CompileOptions::lenient();
    let unit = compile_with(src, &lenient);
    assert!(unit.is_emittable(&lenient));
    assert_eq!(unit.ir.template_nodes.len(), 2);
    assert_eq!(unit.diagnostics.errors[0].code, ERR_UNKNOWN_TAG);
}

#[test]
fn test_diagnostics_carry_file_path() {
    let options = CompileOptions {
        file_path: "widgets/card.htms".to_string(),
        ..CompileOptions::lenient()
    };
    let unit = compile_with(
        r#"<component name="x-a"><repeat count="5000"></repeat><blink></blink></component>"#,
        &options,
    );
    assert_eq!(unit.diagnostics.warnings[0].file, "widgets/card.htms");
    assert_eq!(unit.diagnostics.errors[0].file, "widgets/card.htms");
}
