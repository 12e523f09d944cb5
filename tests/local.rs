fn run(source: &str) -> String {
    let mut out = Vec::new();
    bytelox::interpret(source, &mut out).expect("program failed");
    String::from_utf8(out).unwrap()
}

#[test]
fn test_shadowing() {
    let source = r#"
var a = 1;
{
  var a = 2;
  print a;
}
print a;
"#;
    assert_eq!(
        r#"2
1"#,
        run(source).trim()
    );
}

#[test]
fn test_nested_scopes_address_their_slots() {
    let source = r#"
{
  var a = 1;
  {
    var b = 2;
    print a + b;
  }
  print a;
}
"#;
    assert_eq!(
        r#"3
1"#,
        run(source).trim()
    );
}

#[test]
fn test_local_assignment_leaves_value() {
    let source = r#"
{
  var a = 1;
  print a = 2;
  print a;
}
"#;
    assert_eq!(
        r#"2
2"#,
        run(source).trim()
    );
}

#[test]
fn test_chained_local_assignment() {
    let source = r#"
{
  var a = 1;
  var b = 2;
  a = b = 3;
  print a;
  print b;
}
"#;
    assert_eq!(
        r#"3
3"#,
        run(source).trim()
    );
}

#[test]
fn test_local_shadows_global() {
    let source = r#"
var a = "global";
{
  var a = "local";
  print a;
}
print a;
"#;
    assert_eq!(
        r#"local
global"#,
        run(source).trim()
    );
}

#[test]
fn test_default_initializer_is_nil() {
    let source = r#"
{
  var a;
  print a;
}
"#;
    assert_eq!("nil", run(source).trim());
}

#[test]
fn test_scope_exit_pops_locals() {
    // globals and later locals still resolve correctly after a block
    // full of locals has been cleaned up
    let source = r#"
{
  var a = 1;
  var b = 2;
  var c = 3;
  print a + b + c;
}
{
  var d = 10;
  print d;
}
"#;
    assert_eq!(
        r#"6
10"#,
        run(source).trim()
    );
}
