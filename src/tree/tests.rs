#[cfg(test)]
mod tests {
    use crate::runtime::{run, CharStream, InvocationRequest, NativeParseResult, Token};
    use crate::testing::{load_grammar, EXPR, HELLO};
    use crate::tree::{
        DefaultTreeListener, NodeId, NodeKind, ParseTree, ParseTreeListener, ParseTreeWalker,
        RuleEvent,
    };
    use std::sync::Arc;

    fn native(grammar: (&str, &str), input: &str) -> NativeParseResult {
        let recognizer = load_grammar(grammar.0, grammar.1);
        run(&recognizer, CharStream::from_text(input), &InvocationRequest::new()).unwrap()
    }

    fn hello_tree() -> ParseTree {
        ParseTree::from_result(&native(("Hello", HELLO), "hello World;")).unwrap()
    }

    /// Records the event sequence as text
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        resets: usize,
    }

    impl ParseTreeListener for Recorder {
        fn reset(&mut self) {
            self.resets += 1;
        }

        fn enter_rule(&mut self, event: &RuleEvent<'_>) {
            self.events.push(format!("enter {} {}..{}", event.name, event.start, event.end));
        }

        fn exit_rule(&mut self, event: &RuleEvent<'_>) {
            self.events.push(format!("exit {}", event.name));
        }

        fn visit_terminal(&mut self, token: &Token, symbol: &str) {
            self.events.push(format!("terminal {} {}", symbol, token.text));
        }
    }

    // ============================================================================
    // Walker
    // ============================================================================

    #[test]
    fn test_walker_events_are_nested() {
        let result = native(("Expr", EXPR), "1*2");
        let mut recorder = Recorder::default();
        assert!(ParseTreeWalker::walk(&mut recorder, &result));

        assert_eq!(recorder.resets, 1);
        assert_eq!(
            recorder.events,
            vec![
                "enter prog 0..3",
                "enter expr 0..3",
                "enter expr 0..1",
                "terminal INT 1",
                "exit expr",
                "terminal '*' *",
                "enter expr 2..3",
                "terminal INT 2",
                "exit expr",
                "exit expr",
                "terminal EOF <EOF>",
                "exit prog",
            ]
        );
    }

    #[test]
    fn test_walker_without_root() {
        let result = native(("Hello", HELLO), "goodbye");
        let mut recorder = Recorder::default();
        assert!(!ParseTreeWalker::walk(&mut recorder, &result));
        assert!(recorder.events.is_empty());
        assert!(ParseTree::from_result(&result).is_none());
    }

    // ============================================================================
    // Tree building
    // ============================================================================

    #[test]
    fn test_greeting_tree() {
        let tree = hello_tree();
        let root = tree.root().unwrap();

        assert_eq!(root.rule_name(), Some("greeting"));
        assert_eq!(root.parent, None);
        assert_eq!((root.start, root.end), (0, 12));

        let children = tree.children(root.id);
        assert_eq!(children.len(), 3);
        let labels: Vec<&str> = children.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["'hello'", "NAME", "';'"]);
        assert_eq!(children[1].text(), Some("World"));
        assert_eq!((children[1].start, children[1].end), (6, 11));
        assert_eq!(tree.parent(children[1].id).unwrap().id, root.id);
    }

    #[test]
    fn test_node_count_and_degenerate() {
        let tree = hello_tree();
        assert_eq!(tree.node_count(), 4);
        assert!(!tree.is_degenerate());
        assert!(ParseTree::default().is_degenerate());
    }

    #[test]
    fn test_preorder_and_find_by_rule() {
        let tree = ParseTree::from_result(&native(("Expr", EXPR), "1+2*3")).unwrap();

        let labels: Vec<&str> = tree.nodes().map(|n| n.label()).collect();
        assert_eq!(
            labels,
            vec!["prog", "expr", "expr", "INT", "'+'", "expr", "expr", "INT", "'*'", "expr", "INT", "EOF"]
        );

        let exprs = tree.find_by_rule("expr");
        assert_eq!(exprs.len(), 5);
        // Tree order: the outermost expression comes first
        assert_eq!((exprs[0].start, exprs[0].end), (0, 5));
        assert!(tree.find_by_rule("stmt").is_empty());

        let texts: Vec<&str> = tree.terminals().iter().filter_map(|n| n.text()).collect();
        assert_eq!(texts, vec!["1", "+", "2", "*", "3", "<EOF>"]);
    }

    #[test]
    fn test_string_tree_matches_native() {
        let result = native(("Expr", EXPR), "(1+2)*3");
        let tree = ParseTree::from_result(&result).unwrap();
        assert_eq!(Some(tree.to_string_tree()), result.to_string_tree());
    }

    #[test]
    fn test_subtree() {
        let tree = ParseTree::from_result(&native(("Expr", EXPR), "1+2*3")).unwrap();
        let product = tree.find_by_rule("expr")[2].id;
        let sub = tree.subtree(product).unwrap();

        assert_eq!(sub.to_string_tree(), "(expr (expr 2) * (expr 3))");
        assert_eq!(sub.root().unwrap().parent, None);
        assert_eq!(sub.node_count(), 6);
        assert!(tree.subtree(NodeId(99)).is_none());
    }

    #[test]
    fn test_filtered_listener() {
        let result = native(("Expr", EXPR), "1+2");
        let mut listener = DefaultTreeListener::with_filter(Arc::new(|rule: &str| rule != "expr"));
        ParseTreeWalker::walk(&mut listener, &result);
        let tree = listener.take_tree().unwrap();

        // Terminals of dropped rules attach to the nearest kept ancestor
        assert_eq!(tree.to_string_tree(), "(prog 1 + 2 <EOF>)");
        assert!(listener.tree().is_none());
    }

    #[test]
    fn test_listener_reuse_replaces_tree() {
        let mut listener = DefaultTreeListener::new();
        ParseTreeWalker::walk(&mut listener, &native(("Hello", HELLO), "hello a;"));
        ParseTreeWalker::walk(&mut listener, &native(("Hello", HELLO), "hello b;"));
        let tree = listener.tree().unwrap();
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.terminals()[1].text(), Some("b"));
    }

    // ============================================================================
    // Export
    // ============================================================================

    #[test]
    fn test_to_dot() {
        let dot = hello_tree().to_dot();
        assert!(dot.starts_with("digraph parsetree {"));
        assert!(dot.contains("n0 [label=\"greeting\", shape=ellipse];"));
        assert!(dot.contains("n2 [label=\"NAME\\nWorld\", shape=box];"));
        assert!(dot.contains("n0 -> n1;"));
        assert!(dot.contains("n0 -> n3;"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_to_json() {
        let json = hello_tree().to_json();
        assert_eq!(json["rule"], "greeting");
        assert_eq!(json["children"].as_array().unwrap().len(), 3);
        assert_eq!(json["children"][1]["token"], "NAME");
        assert_eq!(json["children"][1]["text"], "World");
        assert_eq!(json["children"][1]["column"], 6);
        assert_eq!(ParseTree::default().to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_terminal_kind_fields() {
        let tree = hello_tree();
        let name = tree.node(NodeId(2)).unwrap();
        match &name.kind {
            NodeKind::Terminal { line, column, text, .. } => {
                assert_eq!((*line, *column), (1, 6));
                assert_eq!(text, "World");
            }
            other => panic!("expected terminal, got {:?}", other),
        }
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(hello_tree(), hello_tree());
        let other = ParseTree::from_result(&native(("Hello", HELLO), "hello Moon;")).unwrap();
        assert_ne!(hello_tree(), other);
    }
}
