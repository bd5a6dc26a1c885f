use super::LoadError;
use crate::runtime::{RuleInvoker, TokenSource};
use std::collections::HashMap;

/// Name to callable dispatch table populated at load time
pub struct RecognizerRegistry {
    /// Lexer unit name -> token source
    lexers: HashMap<String, Box<dyn TokenSource>>,
    /// Parser unit name -> rule invoker
    parsers: HashMap<String, Box<dyn RuleInvoker>>,
}

impl RecognizerRegistry {
    pub fn new() -> Self {
        Self {
            lexers: HashMap::new(),
            parsers: HashMap::new(),
        }
    }

    /// Register a lexer under its unit name
    pub fn register_lexer(&mut self, lexer: impl TokenSource + 'static) -> Result<(), LoadError> {
        let name = lexer.name().to_string();
        if self.lexers.contains_key(&name) || self.parsers.contains_key(&name) {
            return Err(LoadError::DuplicateUnit(name));
        }
        self.lexers.insert(name, Box::new(lexer));
        Ok(())
    }

    /// Register a parser under its unit name
    pub fn register_parser(&mut self, parser: impl RuleInvoker + 'static) -> Result<(), LoadError> {
        let name = parser.name().to_string();
        if self.lexers.contains_key(&name) || self.parsers.contains_key(&name) {
            return Err(LoadError::DuplicateUnit(name));
        }
        self.parsers.insert(name, Box::new(parser));
        Ok(())
    }

    pub fn lexer(&self, name: &str) -> Option<&dyn TokenSource> {
        self.lexers.get(name).map(|l| &**l)
    }

    pub fn parser(&self, name: &str) -> Option<&dyn RuleInvoker> {
        self.parsers.get(name).map(|p| &**p)
    }

    pub fn lexer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lexers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn parser_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.parsers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered recognizer units
    pub fn len(&self) -> usize {
        self.lexers.len() + self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecognizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
