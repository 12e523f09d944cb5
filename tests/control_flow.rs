fn run(source: &str) -> String {
    let mut out = Vec::new();
    bytelox::interpret(source, &mut out).expect("program failed");
    String::from_utf8(out).unwrap()
}

#[test]
fn test_if_else() {
    assert_eq!("then", run("if (true) print \"then\"; else print \"else\";").trim());
    assert_eq!("else", run("if (false) print \"then\"; else print \"else\";").trim());
}

#[test]
fn test_if_without_else() {
    assert_eq!("yes", run("if (1 < 2) print \"yes\"; print \"\";").trim());
    assert_eq!("", run("if (2 < 1) print \"no\";").trim());
}

#[test]
fn test_short_circuit_and() {
    let source = r#"
print 1 and 2;
print nil and 2;
print false and 2;
"#;
    assert_eq!(
        r#"2
nil
false"#,
        run(source).trim()
    );
}

#[test]
fn test_short_circuit_or() {
    let source = r#"
print 1 or 2;
print nil or "fallback";
print false or nil;
"#;
    assert_eq!(
        r#"1
fallback
nil"#,
        run(source).trim()
    );
}

#[test]
fn test_and_inside_condition() {
    assert_eq!(
        "F",
        run("if (true and false) print \"T\"; else print \"F\";").trim()
    );
}

#[test]
fn test_while_counts() {
    let source = r#"
var x = 0;
while (x < 3) {
  print x;
  x = x + 1;
}
"#;
    assert_eq!(
        r#"0
1
2"#,
        run(source).trim()
    );
}

#[test]
fn test_while_body_can_skip_entirely() {
    let source = r#"
while (0) print "never";
print "done";
"#;
    assert_eq!("done", run(source).trim());
}

#[test]
fn test_nested_while() {
    let source = r#"
var i = 0;
var total = 0;
while (i < 3) {
  var j = 0;
  while (j < 2) {
    total = total + 1;
    j = j + 1;
  }
  i = i + 1;
}
print total;
"#;
    assert_eq!("6", run(source).trim());
}

#[test]
fn test_zero_is_falsey() {
    // the number 0 counts as false, the empty string does not
    assert_eq!("f", run("if (0) print \"t\"; else print \"f\";").trim());
    assert_eq!("42", run("print 0 or 42;").trim());
    assert_eq!("0", run("print 0 and 42;").trim());
    assert_eq!("t", run("if (\"\") print \"t\"; else print \"f\";").trim());
}
