//! Single-line formula format.
//!
//! Clauses are separated by `&`, literals within a clause by `|`, negation is a `-` prefix:
//! `1|-2|3&-1|2`. The whole formula sits on one line, which makes the format convenient to pass
//! on a command line.
use std::io;

use splitsat_formula::{Lit, Set, SetBuilder, MAX_VAR_COUNT};

use crate::ParserError;

/// Parse a formula in single-line format.
pub fn parse_oneline(input: &str) -> Result<Set, ParserError> {
    let mut builder = SetBuilder::new();
    let mut var_count = 0;

    for clause in input.trim().split('&') {
        let mut lits = vec![];
        for token in clause.split('|') {
            let token = token.trim();
            let number: isize = token.parse().map_err(|_| ParserError::UnexpectedInput {
                line: 1,
                token: token.to_string(),
            })?;
            if number == 0 {
                return Err(ParserError::UnexpectedInput {
                    line: 1,
                    token: token.to_string(),
                });
            }
            if number.unsigned_abs() > MAX_VAR_COUNT {
                return Err(ParserError::LiteralTooLarge {
                    line: 1,
                    literal: token.to_string(),
                });
            }
            var_count = var_count.max(number.unsigned_abs());
            lits.push(Lit::from_dimacs(number));
        }
        builder.add_lits(lits);
    }

    let mut set = builder.finish();
    set.set_var_count(var_count);
    Ok(set)
}

/// Write a set in single-line format.
pub fn write_oneline(target: &mut impl io::Write, set: &Set) -> io::Result<()> {
    for (clause_index, clause) in set.clauses().iter().enumerate() {
        if clause_index > 0 {
            target.write_all(b"&")?;
        }
        for (lit_index, lit) in clause.lits().iter().enumerate() {
            if lit_index > 0 {
                target.write_all(b"|")?;
            }
            itoa::write(&mut *target, lit.to_dimacs())?;
        }
    }
    target.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use splitsat_formula::set;

    #[test]
    fn parses_the_documented_example() {
        let parsed = parse_oneline("1|-2|3&-1|2").unwrap();
        assert_eq!(parsed, {
            let mut expected = set![1, -2, 3; -1, 2;];
            expected.set_var_count(3);
            expected
        });
    }

    #[test]
    fn whitespace_between_tokens_is_accepted() {
        let parsed = parse_oneline(" 1 | -2 & 2 ").unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert!(matches!(
            parse_oneline("1|0"),
            Err(ParserError::UnexpectedInput { .. })
        ));
        assert!(matches!(
            parse_oneline("1|a&2"),
            Err(ParserError::UnexpectedInput { .. })
        ));
        assert!(matches!(
            parse_oneline(""),
            Err(ParserError::UnexpectedInput { .. })
        ));
    }

    #[test]
    fn roundtrip() {
        let set = {
            let mut set = set![1, -2, 3; -1, 2; 4;];
            set.set_var_count(4);
            set
        };
        let mut written = vec![];
        write_oneline(&mut written, &set).unwrap();
        assert_eq!(written, b"1|-2|3&-1|2&4\n");

        let parsed = parse_oneline(std::str::from_utf8(&written).unwrap()).unwrap();
        assert_eq!(parsed, set);
    }
}
