use hotscript_line::{Action, CommandSet, LineId, Program};
use hotscript_parse::{Item, Statement, label, load};
use proptest::prelude::*;

fn st(keyword: &str, args: &[&str]) -> Item {
    Item::Statement(Statement::new(keyword, 0).with_args(args.iter().copied()))
}

fn load_items(items: Vec<Item>) -> Result<Program, hotscript_parse::LoadError> {
    let items = items.into_iter().enumerate().map(|(i, item)| match item {
        Item::Statement(mut s) => {
            s.line_no = i as u32 + 1;
            Item::Statement(s)
        }
        Item::Label { name, .. } => label(&name, i as u32 + 1),
    });
    load("t.hks", items, CommandSet::new())
}

fn id(n: u32) -> Option<LineId> {
    Some(LineId(n))
}

#[test]
fn if_else_blocks_are_paired() {
    let program = load_items(vec![
        st("if", &["(1 > 2)"]),
        st("{", &[]),
        st("return", &[]),
        st("}", &[]),
        st("else", &[]),
        st("{", &[]),
        st("return", &[]),
        st("}", &[]),
    ])
    .expect("load");
    let lines = &program.script.lines;
    assert_eq!(lines.len(), 9, "implicit exit appended");
    assert_eq!(lines[8].action, Action::Exit);
    assert_eq!(lines[0].related, id(4));
    assert_eq!(lines[4].related, id(8));
    assert_eq!(lines[1].related, id(3));
    assert_eq!(lines[3].related, id(1));
    assert_eq!(lines[1].parent, id(0));
    assert_eq!(lines[2].parent, id(1));
    assert_eq!(lines[5].parent, id(4));
    assert_eq!(program.script.else_of(LineId(0)), id(4));
}

#[test]
fn dangling_else_binds_to_innermost_if() {
    let program = load_items(vec![
        st("if", &["a"]),
        st("if", &["b"]),
        st("=", &["x", "1"]),
        st("else", &[]),
        st("=", &["x", "2"]),
        st("=", &["y", "3"]),
    ])
    .expect("load");
    let lines = &program.script.lines;
    assert_eq!(lines[1].related, id(3));
    assert_eq!(lines[3].related, id(5));
    assert_eq!(lines[0].related, id(5));
    assert_eq!(program.script.else_of(LineId(0)), None);
    assert_eq!(lines[2].parent, id(1));
    assert_eq!(lines[4].parent, id(3));
}

#[test]
fn same_line_action_becomes_the_body() {
    let stmt = Statement::new("IfEqual", 1)
        .with_args(["x", "1"])
        .then(Statement::new("Return", 1));
    let program = load("t.hks", [Item::Statement(stmt)], CommandSet::new()).expect("load");
    let lines = &program.script.lines;
    assert_eq!(lines[1].action, Action::Return);
    assert_eq!(lines[1].parent, id(0));
    assert_eq!(lines[0].related, id(2));
}

#[test]
fn else_without_if_is_rejected() {
    let err = load_items(vec![st("=", &["x", "1"]), st("else", &[]), st("return", &[])])
        .expect_err("expected load error");
    assert_eq!(err.line, 2);
    assert!(err.message.contains("ELSE with no matching IF"), "{err}");
}

#[test]
fn unbalanced_braces_are_rejected() {
    let err = load_items(vec![st("{", &[]), st("=", &["x", "1"])]).expect_err("missing close");
    assert!(err.message.contains("missing \"}\""), "{err}");
    let err = load_items(vec![st("=", &["x", "1"]), st("}", &[])]).expect_err("missing open");
    assert!(err.message.contains("missing \"{\""), "{err}");
}

#[test]
fn if_without_body_is_rejected() {
    let err = load_items(vec![st("=", &["x", "1"]), st("if", &["x"])]).expect_err("no body");
    assert!(err.message.contains("IF has no action"), "{err}");
    let err = load_items(vec![st("loop", &[]), st("{", &[]), st("}", &[]), st("loop", &["2"]), st("else", &[]), st("return", &[])])
        .expect_err("loop body is else");
    assert!(err.message.contains("LOOP has no action"), "{err}");
}

#[test]
fn break_must_be_inside_a_loop() {
    let err = load_items(vec![st("{", &[]), st("break", &[]), st("}", &[])]).expect_err("break");
    assert!(err.message.contains("enclosed by a Loop"), "{err}");

    load_items(vec![
        st("loop", &["3"]),
        st("{", &[]),
        st("if", &["(A_Index = 2)"]),
        st("{", &[]),
        st("continue", &[]),
        st("}", &[]),
        st("break", &[]),
        st("}", &[]),
    ])
    .expect("break/continue nested in a loop body");
}

#[test]
fn goto_into_a_loop_is_rejected_at_load() {
    let err = load_items(vec![
        st("goto", &["inner"]),
        st("loop", &["3"]),
        st("{", &[]),
        label("inner", 0),
        st(":=", &["x", "1"]),
        st("}", &[]),
    ])
    .expect_err("jump into loop");
    assert_eq!(err.line, 1);
    assert!(err.message.contains("cannot jump into a block or loop"), "{err}");
}

#[test]
fn goto_out_of_a_block_is_allowed() {
    let program = load_items(vec![
        st("loop", &[]),
        st("{", &[]),
        st("goto", &["done"]),
        st("}", &[]),
        label("done", 0),
        st("return", &[]),
    ])
    .expect("load");
    let goto = &program.script.lines[2];
    assert!(matches!(goto.attribute, hotscript_line::Attribute::Label(_)));
}

#[test]
fn unknown_and_duplicate_labels() {
    let err = load_items(vec![st("gosub", &["nowhere"])]).expect_err("unknown");
    assert!(err.message.contains("does not exist"), "{err}");
    let err = load_items(vec![label("a", 0), st("return", &[]), label("A", 0)])
        .expect_err("duplicate");
    assert!(err.message.contains("duplicate label"), "{err}");
}

#[test]
fn dynamic_goto_is_left_for_run_time() {
    let program = load_items(vec![st("goto", &["%target%"]), label("x", 0), st("return", &[])])
        .expect("load");
    assert_eq!(program.script.lines[0].attribute, hotscript_line::Attribute::None);
}

#[derive(Clone, Debug)]
enum Node {
    Simple,
    Block(Vec<Node>),
    If(Box<Node>, Option<Box<Node>>),
    Loop(Box<Node>),
}

fn node() -> impl Strategy<Value = Node> {
    Just(Node::Simple).prop_recursive(4, 40, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Node::Block),
            (inner.clone(), prop::option::of(inner.clone()))
                .prop_map(|(t, e)| Node::If(Box::new(t), e.map(Box::new))),
            inner.prop_map(|b| Node::Loop(Box::new(b))),
        ]
    })
}

fn emit(node: &Node, out: &mut Vec<Item>) {
    match node {
        Node::Simple => out.push(st(":=", &["x", "x + 1"])),
        Node::Block(body) => {
            out.push(st("{", &[]));
            for n in body {
                emit(n, out);
            }
            out.push(st("}", &[]));
        }
        Node::If(then, otherwise) => {
            out.push(st("if", &["x", "<", "3"]));
            emit(then, out);
            if let Some(e) = otherwise {
                out.push(st("else", &[]));
                emit(e, out);
            }
        }
        Node::Loop(body) => {
            out.push(st("loop", &["2"]));
            emit(body, out);
        }
    }
}

fn script_items(nodes: &[Node]) -> Vec<Item> {
    let mut out = Vec::new();
    for n in nodes {
        emit(n, &mut out);
    }
    out
}

proptest! {
    #[test]
    fn well_formed_scripts_pair_every_marker(nodes in prop::collection::vec(node(), 1..5)) {
        let program = load_items(script_items(&nodes)).expect("well-formed script loads");
        let script = &program.script;
        for (i, line) in script.lines.iter().enumerate() {
            let me = LineId(i as u32);
            match line.action {
                Action::BlockBegin => {
                    let end = line.related.expect("block end");
                    prop_assert_eq!(script.line(end).action, Action::BlockEnd);
                    prop_assert_eq!(script.line(end).related, Some(me));
                }
                Action::Else => {
                    let owners = (0..script.lines.len())
                        .map(|j| LineId(j as u32))
                        .filter(|&j| script.is_if_family(j) && script.else_of(j) == Some(me))
                        .count();
                    prop_assert_eq!(owners, 1);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn dropping_a_brace_is_a_load_error(nodes in prop::collection::vec(node(), 1..5), pick in any::<prop::sample::Index>()) {
        let mut items = script_items(&nodes);
        let braces: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, it)| matches!(it, Item::Statement(s) if s.keyword == "{" || s.keyword == "}"))
            .map(|(i, _)| i)
            .collect();
        prop_assume!(!braces.is_empty());
        items.remove(braces[pick.index(braces.len())]);
        prop_assert!(load_items(items).is_err());
    }
}
