//! Shared fixtures for unit tests.

use crate::artifact::CompiledBundleSet;
use crate::compiler::InMemoryCompiler;
use crate::loader::LoadedRecognizer;
use crate::tool::{GenerationOptions, Generator, GrammarSource, GrammarTool};

pub const HELLO: &str = r#"
grammar Hello;

greeting : 'hello' NAME ';' ;

NAME : [A-Za-z]+ ;
WS : [ \t\r\n]+ -> skip ;
"#;

pub const EXPR: &str = r#"
grammar Expr;

prog : expr EOF ;

expr
    : <assoc=right> expr '^' expr
    | expr ('*' | '/') expr
    | expr ('+' | '-') expr
    | '-' expr
    | '(' expr ')'
    | INT
    ;

INT : [0-9]+ ;
WS : [ \t\r\n]+ -> skip ;
"#;

pub const KEYWORDS: &str = r#"
grammar Keywords;

stmt : SELECT ID FROM ID ;

SELECT : 'SELECT' ;
FROM : 'FROM' ;
ID : [a-zA-Z_]+ ;
WS : [ \t\r\n]+ -> skip ;
"#;

pub fn compile_grammar(name: &str, text: &str) -> CompiledBundleSet {
    let source = GrammarSource::from_text(format!("{}.g4", name), text);
    let generated = GrammarTool::new()
        .generate(&source, &GenerationOptions::default())
        .expect("grammar should generate");
    InMemoryCompiler::new()
        .compile(generated.units)
        .expect("units should compile")
}

pub fn load_grammar(name: &str, text: &str) -> LoadedRecognizer {
    LoadedRecognizer::load(&compile_grammar(name, text)).expect("bundle should load")
}
