//! DIMACS CNF parser and writer for the splitsat SAT solver.

use std::{borrow::Borrow, io};

use anyhow::Error;
use thiserror::Error;

use splitsat_formula::{Lit, Set, SetBuilder, MAX_VAR_COUNT};

pub mod oneline;

/// Possible errors while parsing a CNF formula.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("line {line}: Unexpected token in CNF input: '{token}'")]
    UnexpectedInput { line: usize, token: String },
    #[error("line {line}: Literal index is too large: {literal}")]
    LiteralTooLarge { line: usize, literal: String },
    #[error("line {line}: Invalid header syntax: {header}")]
    InvalidHeader { line: usize, header: String },
    #[error("line {line}: Unterminated clause")]
    UnterminatedClause { line: usize },
    #[error("Formula has {var_count} variables while the header specifies {header_var_count}")]
    VarCount {
        var_count: usize,
        header_var_count: usize,
    },
    #[error("Formula has {clause_count} clauses while the header specifies {header_clause_count}")]
    ClauseCount {
        clause_count: usize,
        header_clause_count: usize,
    },
}

/// Variable and clause count present in a DIMACS CNF header.
#[derive(Copy, Clone, Debug)]
pub struct DimacsHeader {
    pub var_count: usize,
    pub clause_count: usize,
}

/// Parser for DIMACS CNF files.
#[derive(Default)]
pub struct DimacsParser {
    builder: SetBuilder,
    partial_clause: Vec<Lit>,
    header: Option<DimacsHeader>,

    line_number: usize,
    clause_count: usize,
    var_count: usize,
}

impl DimacsParser {
    /// Create a new DIMACS CNF parser.
    pub fn new() -> DimacsParser {
        DimacsParser::default()
    }

    /// Parse the given input into a [`Set`] and check the header if present.
    ///
    /// Clause-level canonicalization happens on the fly: tautological and duplicate clauses are
    /// dropped, an empty clause collapses the set to false. The header counts are checked against
    /// the input as written, before any clause is dropped.
    pub fn parse(input: impl io::Read) -> Result<Set, Error> {
        use io::BufRead;

        let mut parser = DimacsParser::new();
        let reader = io::BufReader::new(input);

        for line in reader.lines() {
            parser.parse_line(&line?)?;
        }

        parser.finish().map_err(Error::from)
    }

    /// Parse a string rather than an `io::Read` input.
    pub fn parse_str(input: &str) -> Result<Set, Error> {
        let mut parser = DimacsParser::new();
        for line in input.lines() {
            parser.parse_line(line)?;
        }
        parser.finish().map_err(Error::from)
    }

    /// Consume one line of input.
    pub fn parse_line(&mut self, line: &str) -> Result<(), ParserError> {
        self.line_number += 1;

        let trimmed = line.trim_start();
        if trimmed.starts_with('c') || trimmed.is_empty() {
            return Ok(());
        }
        if trimmed.starts_with('p') {
            return self.parse_header(trimmed);
        }

        for token in trimmed.split_whitespace() {
            let number: isize = token.parse().map_err(|_| ParserError::UnexpectedInput {
                line: self.line_number,
                token: token.to_string(),
            })?;

            if number == 0 {
                self.end_clause();
            } else {
                let index = number.unsigned_abs();
                if index > MAX_VAR_COUNT {
                    return Err(ParserError::LiteralTooLarge {
                        line: self.line_number,
                        literal: token.to_string(),
                    });
                }
                self.var_count = self.var_count.max(index);
                self.partial_clause.push(Lit::from_dimacs(number));
            }
        }

        Ok(())
    }

    /// Signal the end of the input, check the header and return the parsed set.
    pub fn finish(self) -> Result<Set, ParserError> {
        if !self.partial_clause.is_empty() {
            return Err(ParserError::UnterminatedClause {
                line: self.line_number,
            });
        }

        let mut set = self.builder.finish();
        set.set_var_count(self.var_count);

        if let Some(header) = self.header {
            if self.var_count > header.var_count {
                return Err(ParserError::VarCount {
                    var_count: self.var_count,
                    header_var_count: header.var_count,
                });
            }
            if self.clause_count != header.clause_count {
                return Err(ParserError::ClauseCount {
                    clause_count: self.clause_count,
                    header_clause_count: header.clause_count,
                });
            }
            set.set_var_count(header.var_count);
        }

        Ok(set)
    }

    /// The header line seen so far, if any.
    pub fn header(&self) -> Option<DimacsHeader> {
        self.header
    }

    fn parse_header(&mut self, line: &str) -> Result<(), ParserError> {
        let invalid = || ParserError::InvalidHeader {
            line: self.line_number,
            header: line.to_string(),
        };

        if self.header.is_some() {
            return Err(invalid());
        }

        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("p") || tokens.next() != Some("cnf") {
            return Err(invalid());
        }
        let var_count = tokens
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(invalid)?;
        let clause_count = tokens
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(invalid)?;
        if tokens.next().is_some() {
            return Err(invalid());
        }

        self.header = Some(DimacsHeader {
            var_count,
            clause_count,
        });
        Ok(())
    }

    fn end_clause(&mut self) {
        let lits = std::mem::replace(&mut self.partial_clause, vec![]);
        self.builder.add_lits(lits);
        self.clause_count += 1;
    }
}

/// Write a header line for the given variable and clause counts.
pub fn write_dimacs_header(target: &mut impl io::Write, header: DimacsHeader) -> io::Result<()> {
    writeln!(
        target,
        "p cnf {var_count} {clause_count}",
        var_count = header.var_count,
        clause_count = header.clause_count
    )
}

/// Write an iterator of clauses as headerless DIMACS CNF.
pub fn write_dimacs_clauses(
    target: &mut impl io::Write,
    clauses: impl IntoIterator<Item = impl IntoIterator<Item = impl Borrow<Lit>>>,
) -> io::Result<()> {
    for clause in clauses.into_iter() {
        for lit in clause.into_iter() {
            itoa::write(&mut *target, lit.borrow().to_dimacs())?;
            target.write_all(b" ")?;
        }
        target.write_all(b"0\n")?;
    }
    Ok(())
}

/// Write a set as DIMACS CNF.
pub fn write_dimacs(target: &mut impl io::Write, set: &Set) -> io::Result<()> {
    write_dimacs_header(
        &mut *target,
        DimacsHeader {
            var_count: set.var_count(),
            clause_count: set.len(),
        },
    )?;
    write_dimacs_clauses(
        &mut *target,
        set.clauses().iter().map(|clause| clause.lits()),
    )
}
