use toposcope_core::error::Error;
use toposcope_core::package::Package;
use toposcope_core::predicate::Predicate;

fn web() -> Package {
    Package::new("@acme/web", "2.1.0", "/repo/packages/web")
        .with_dependency("react", "^18.0.0")
        .with_dependency("@acme/ui", "workspace:*")
}

fn docs() -> Package {
    Package::new("docs", "0.3.0", "/repo/packages/docs").with_private(true)
}

fn eval(source: &str, package: &Package) -> bool {
    Predicate::parse(source).unwrap().evaluate(package).unwrap()
}

fn parse_error(source: &str) -> String {
    match Predicate::parse(source).unwrap_err() {
        Error::PredicateEvaluation { expression, message } => {
            assert_eq!(expression, source);
            message
        }
        other => panic!("expected a predicate error, got {other}"),
    }
}

#[test]
fn test_boolean_attribute() {
    assert!(eval("private", &docs()));
    assert!(!eval("private", &web()));
    assert!(eval("!private", &web()));
}

#[test]
fn test_string_equality() {
    assert!(eval("name == \"docs\"", &docs()));
    assert!(eval("name != 'docs'", &web()));
    assert!(eval("private == true", &docs()));
}

#[test]
fn test_dependency_membership() {
    assert!(eval("\"react\" in dependencies", &web()));
    assert!(!eval("\"react\" in dependencies", &docs()));
}

#[test]
fn test_regex_match() {
    assert!(eval("name =~ \"^@acme/\"", &web()));
    assert!(!eval("name =~ \"^@acme/\"", &docs()));
    assert!(eval(r#"version =~ "^\d+\.1\.""#, &web()));
}

#[test]
fn test_semver_comparison() {
    assert!(eval("version >= \"2.0.0\"", &web()));
    assert!(eval("version < \"1.0.0\"", &docs()));
    // Lexically "10.0.0" < "9.0.0"; semver disagrees.
    let ten = Package::new("ten", "10.0.0", "/repo/ten");
    assert!(eval("version > \"9.0.0\"", &ten));
}

#[test]
fn test_grouping_and_precedence() {
    let source = "(name == \"docs\" || \"react\" in dependencies) && !private";
    assert!(eval(source, &web()));
    assert!(!eval(source, &docs()));
}

#[test]
fn test_unknown_attribute() {
    let message = parse_error("author == \"me\"");
    assert!(message.contains("unknown attribute `author`"));
    assert!(message.contains("name, version, private, dependencies"));
}

#[test]
fn test_type_errors_are_rejected_at_parse_time() {
    assert!(parse_error("name == true").contains("cannot apply `==`"));
    assert!(parse_error("private in dependencies").contains("cannot apply `in`"));
    assert!(parse_error("private >= \"1.0.0\"").contains("cannot apply `>=`"));
    assert!(parse_error("name").contains("expected a boolean condition"));
}

#[test]
fn test_invalid_literals() {
    assert!(parse_error("version > \"one\"").contains("not a valid version"));
    assert!(parse_error("name =~ \"(\"").contains("invalid regex"));
    assert!(parse_error("name =~ version").contains("string literal"));
}

#[test]
fn test_syntax_errors() {
    parse_error("");
    parse_error("(private");
    parse_error("private private");
    parse_error("name == \"unterminated");
    parse_error("private & private");
}

#[test]
fn test_version_evaluation_error_names_package() {
    let odd = Package::new("odd", "latest", "/repo/odd");
    let predicate = Predicate::parse("version >= \"1.0.0\"").unwrap();

    let err = predicate.evaluate(&odd).unwrap_err();
    assert!(err.to_string().contains("'odd'"));
}

#[test]
fn test_function_predicate() {
    let predicate = Predicate::from_fn(|p| p.dependencies.len() > 1);

    assert!(predicate.evaluate(&web()).unwrap());
    assert!(!predicate.evaluate(&docs()).unwrap());
    assert_eq!(predicate.source(), None);
}

#[test]
fn test_from_str() {
    let predicate: Predicate = "private".parse().unwrap();
    assert_eq!(predicate.source(), Some("private"));
}

#[test]
fn test_evaluation_does_not_modify_package() {
    let package = web();
    let before = package.clone();
    eval("\"react\" in dependencies && version >= \"1.0.0\"", &package);
    assert_eq!(package, before);
}
