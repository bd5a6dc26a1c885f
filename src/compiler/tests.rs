#[cfg(test)]
mod tests {
    use crate::artifact::{GeneratedUnit, PrefixClassifier};
    use crate::compiler::image::{self, ImageError, ParseExpr, RuleBody, UnitImage};
    use crate::compiler::sexpr::{self, Value};
    use crate::compiler::{
        CompilationError, CompilerDiagnostic, CompilerOutput, HostCompiler, InMemoryCompiler,
        Severity,
    };
    use crate::testing::{compile_grammar, EXPR};
    use std::sync::Arc;

    const MINI_LEXER: &str = r#"
(lexer "MiniLexer"
  (grammar "Mini")
  (modes "DEFAULT_MODE")
  (token 1 "ID")
  (token 2 "WS")
  (rule "ID" 1 "DEFAULT_MODE" (alt (plus (set (range 97 122)))))
  (rule "WS" 2 "DEFAULT_MODE" (alt (plus (lit " ")) (skip))))
"#;

    const MINI_PARSER: &str = r#"
(parser "MiniParser"
  (grammar "Mini")
  (vocab "MiniLexer")
  (start "words")
  (rule "words" (alt (plus (tok "ID")))))
"#;

    fn mini_units() -> Vec<GeneratedUnit> {
        vec![
            GeneratedUnit::generated("MiniLexer", MINI_LEXER),
            GeneratedUnit::generated("MiniParser", MINI_PARSER),
        ]
    }

    /// Host compiler returning a fixed set of artifacts
    struct FixedHost(Vec<&'static str>);

    impl HostCompiler for FixedHost {
        fn compile(&self, _sources: &[GeneratedUnit]) -> CompilerOutput {
            CompilerOutput {
                artifacts: self.0.iter().map(|name| (name.to_string(), vec![0xAB])).collect(),
                diagnostics: Vec::new(),
            }
        }
    }

    // ============================================================================
    // Unit source reader
    // ============================================================================

    #[test]
    fn test_read_forms() {
        let forms = sexpr::read_all("; header\n(unit \"a\\\"b\" -12 sym\n  (nested))\n").unwrap();
        assert_eq!(forms.len(), 1);

        let form = &forms[0];
        assert_eq!(form.head(), Some("unit"));
        assert_eq!((form.line, form.column), (2, 0));

        let args = form.args();
        assert_eq!(args[0].as_str(), Some("a\"b"));
        assert_eq!(args[1].as_int(), Some(-12));
        assert_eq!(args[2].value, Value::Symbol("sym".to_string()));
        assert_eq!(args[3].head(), Some("nested"));
        assert_eq!((args[3].line, args[3].column), (3, 2));
    }

    #[test]
    fn test_read_errors() {
        let error = sexpr::read_all("(open").unwrap_err();
        assert_eq!(error.message, "unterminated list");

        let error = sexpr::read_all("(\"bad \\q\")").unwrap_err();
        assert!(error.message.contains("unknown escape"));

        let error = sexpr::read_all(")").unwrap_err();
        assert_eq!(error.to_string(), "1:0: unexpected ')'");
    }

    #[test]
    fn test_read_nesting_limit() {
        let limit = sexpr::MAX_NESTING;
        let deepest = format!("{}{}", "(".repeat(limit), ")".repeat(limit));
        assert_eq!(sexpr::read_all(&deepest).unwrap().len(), 1);

        let error = sexpr::read_all(&"(".repeat(1_000_000)).unwrap_err();
        assert!(error.message.starts_with("nesting too deep"), "{}", error.message);
        assert_eq!((error.line, error.column), (1, limit));
    }

    // ============================================================================
    // Host compiler
    // ============================================================================

    #[test]
    fn test_compile_bundles_and_inner_units() {
        let set = InMemoryCompiler::new().compile(mini_units()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.unit_count(), 5);

        let lexer = set.bundle("MiniLexer").unwrap();
        let inner: Vec<&str> = lexer
            .inner_units()
            .iter()
            .map(|id| set.unit(*id).unwrap().name.as_str())
            .collect();
        assert_eq!(inner, vec!["MiniLexer$ID", "MiniLexer$WS"]);

        let (_, parser_rule) = set.unit_by_name("MiniParser$words").unwrap();
        assert!(parser_rule.is_inner());
        assert!(set.verify_classification(&PrefixClassifier::new()).is_ok());
    }

    #[test]
    fn test_primary_images() {
        let set = InMemoryCompiler::new().compile(mini_units()).unwrap();

        let (_, primary) = set.unit_by_name("MiniParser").unwrap();
        match image::decode(&primary.payload).unwrap() {
            UnitImage::ParserHeader(header) => {
                assert_eq!(header.vocabulary_unit, "MiniLexer");
                assert_eq!(header.rule_names, vec!["words"]);
                assert_eq!(header.rule_units, vec!["MiniParser$words"]);
                assert_eq!(header.start_rule, 0);
            }
            other => panic!("expected a parser header, got {}", other.kind()),
        }

        let (_, rule) = set.unit_by_name("MiniParser$words").unwrap();
        match image::decode(&rule.payload).unwrap() {
            UnitImage::ParserRule(rule) => {
                assert_eq!(
                    rule.body,
                    RuleBody::Plain(ParseExpr::Plus {
                        body: Box::new(ParseExpr::Token(1)),
                        greedy: true,
                    })
                );
            }
            other => panic!("expected a parser rule, got {}", other.kind()),
        }
    }

    #[test]
    fn test_generated_grammar_compiles() {
        let set = compile_grammar("Expr", EXPR);
        assert!(set.bundle("ExprLexer").is_some());
        let parser = set.bundle("ExprParser").unwrap();
        assert_eq!(parser.inner_units().len(), 2);

        let (_, expr) = set.unit_by_name("ExprParser$expr").unwrap();
        assert!(matches!(
            image::decode(&expr.payload).unwrap(),
            UnitImage::ParserRule(rule) if matches!(rule.body, RuleBody::LeftRecursive { .. })
        ));
    }

    #[test]
    fn test_image_rejects_foreign_payload() {
        assert!(matches!(image::decode(b"nope"), Err(ImageError::BadMagic)));
        let mut truncated = image::IMAGE_MAGIC.to_vec();
        truncated.push(0xFF);
        assert!(matches!(image::decode(&truncated), Err(ImageError::Decode(_))));
    }

    // ============================================================================
    // Diagnostics
    // ============================================================================

    #[test]
    fn test_unknown_token_diagnostic() {
        let parser = MINI_PARSER.replace("(tok \"ID\")", "(tok \"NUM\")");
        let units = vec![
            GeneratedUnit::generated("MiniLexer", MINI_LEXER),
            GeneratedUnit::generated("MiniParser", parser),
        ];
        let error = InMemoryCompiler::new().compile(units).unwrap_err();
        let diagnostics = error.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].unit, "MiniParser");
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert!(diagnostics[0]
            .to_string()
            .starts_with("MiniParser:6:"));
        assert!(diagnostics[0].to_string().contains(": error: cannot find symbol: token NUM"));
    }

    #[test]
    fn test_missing_vocabulary_unit() {
        let units = vec![GeneratedUnit::generated("MiniParser", MINI_PARSER)];
        let error = InMemoryCompiler::new().compile(units).unwrap_err();
        assert!(error.to_string().contains("cannot find symbol: lexer MiniLexer"));
    }

    #[test]
    fn test_unit_name_must_match_source() {
        let units = vec![
            GeneratedUnit::generated("MiniLexer", MINI_LEXER),
            GeneratedUnit::generated("Renamed", MINI_PARSER),
        ];
        let error = InMemoryCompiler::new().compile(units).unwrap_err();
        assert!(error
            .to_string()
            .contains("unit MiniParser is declared in source Renamed"));
    }

    #[test]
    fn test_unreadable_utility_fails_everything() {
        let mut units = mini_units();
        units.push(GeneratedUnit::utility("Broken", "(library \"Broken\" (fragment"));
        let error = InMemoryCompiler::new().compile(units).unwrap_err();
        assert!(matches!(error, CompilationError::Failed { .. }));
        assert!(error.to_string().contains("Broken:1:"));
    }

    #[test]
    fn test_diagnostic_rendering() {
        let diagnostic = CompilerDiagnostic::error("Unit", 3, 4, "boom");
        assert_eq!(diagnostic.to_string(), "Unit:3:4: error: boom");
        assert!(diagnostic.is_error());
    }

    // ============================================================================
    // Library linking
    // ============================================================================

    #[test]
    fn test_lexer_links_library_fragments() {
        let library = r#"(library "Chars" (fragment "LOWER" (alt (set (range 97 122)))))"#;
        let lexer = MINI_LEXER
            .replace("(modes", "(extends \"Chars\")\n  (modes")
            .replace("(plus (set (range 97 122)))", "(plus (ref \"LOWER\"))");
        let units = vec![
            GeneratedUnit::generated("MiniLexer", lexer),
            GeneratedUnit::generated("MiniParser", MINI_PARSER),
            GeneratedUnit::utility("Chars", library),
        ];
        let set = InMemoryCompiler::new().compile(units).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.bundle("Chars").unwrap().inner_units().is_empty());
    }

    #[test]
    fn test_extends_requires_library() {
        let lexer = MINI_LEXER.replace("(modes", "(extends \"MiniParser\")\n  (modes");
        let units = vec![
            GeneratedUnit::generated("MiniLexer", lexer),
            GeneratedUnit::generated("MiniParser", MINI_PARSER),
        ];
        let error = InMemoryCompiler::new().compile(units).unwrap_err();
        assert!(error.to_string().contains("MiniParser is not a library unit"));
    }

    // ============================================================================
    // Bundling
    // ============================================================================

    #[test]
    fn test_no_units() {
        let error = InMemoryCompiler::new().compile(Vec::new()).unwrap_err();
        assert!(matches!(error, CompilationError::NoUnits));
    }

    #[test]
    fn test_duplicate_unit_names() {
        let units = vec![
            GeneratedUnit::generated("MiniLexer", MINI_LEXER),
            GeneratedUnit::utility("MiniLexer", MINI_LEXER),
        ];
        let error = InMemoryCompiler::new().compile(units).unwrap_err();
        assert!(matches!(error, CompilationError::DuplicateUnit(name) if name == "MiniLexer"));
    }

    #[test]
    fn test_orphan_artifact() {
        let compiler = InMemoryCompiler::with_host(Box::new(FixedHost(vec!["A", "A$x", "Zed"])));
        let error = compiler
            .compile(vec![GeneratedUnit::generated("A", "")])
            .unwrap_err();
        assert!(matches!(error, CompilationError::OrphanArtifact(name) if name == "Zed"));
    }

    #[test]
    fn test_missing_primary() {
        let compiler = InMemoryCompiler::with_host(Box::new(FixedHost(vec!["A$x"])));
        let error = compiler
            .compile(vec![GeneratedUnit::generated("A", "")])
            .unwrap_err();
        assert!(matches!(error, CompilationError::MissingPrimary(name) if name == "A"));
    }

    #[test]
    fn test_inner_units_go_to_longest_prefix() {
        let compiler = InMemoryCompiler::with_host(Box::new(FixedHost(vec!["A", "AB", "AB$x", "A$y"])));
        let set = compiler
            .compile(vec![
                GeneratedUnit::generated("A", ""),
                GeneratedUnit::generated("AB", ""),
            ])
            .unwrap();
        assert_eq!(set.bundle("A").unwrap().inner_units().len(), 1);
        assert_eq!(set.bundle("AB").unwrap().inner_units().len(), 1);
        let (id, _) = set.unit_by_name("AB$x").unwrap();
        assert_eq!(set.bundle_of(id).unwrap().name(), "AB");
    }

    #[test]
    fn test_custom_classifier() {
        let compiler = InMemoryCompiler::with_host(Box::new(FixedHost(vec!["A", "A.inner"])))
            .classifier(Arc::new(PrefixClassifier::with_separator('.')));
        let set = compiler.compile(vec![GeneratedUnit::generated("A", "")]).unwrap();
        assert_eq!(set.unit_count(), 2);
        assert!(set.verify_classification(&PrefixClassifier::with_separator('.')).is_ok());

        let default = InMemoryCompiler::with_host(Box::new(FixedHost(vec!["A", "A.inner"])));
        assert!(default.compile(vec![GeneratedUnit::generated("A", "")]).is_err());
    }
}
