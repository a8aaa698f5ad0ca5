use std::fmt::Write;

use crate::compiler::quad::Quadruple;

/// Renders the quadruple list as a numbered listing, one instruction per
/// line. Used by the driver's `--quads` flag and handy in test failures.
pub fn render(quads: &[Quadruple]) -> String {
    let width = quads.len().saturating_sub(1).to_string().len().max(2);
    let mut out = String::new();
    for (index, quad) in quads.iter().enumerate() {
        // String formatting cannot fail here
        let _ = writeln!(out, "{:>width$}  {}", index, quad, width = width);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::quad::{Operand, Operator};

    #[test]
    fn test_listing_numbers_every_line() {
        let quads = vec![
            Quadruple::new(
                Operator::Goto,
                Operand::Empty,
                Operand::Empty,
                Operand::Imm(1),
            ),
            Quadruple::new(
                Operator::Plus,
                Operand::Address(1_000),
                Operand::Address(9_000),
                Operand::Address(13_000),
            ),
        ];
        let text = render(&quads);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].trim_start().starts_with("0"));
        assert!(lines[1].contains("+"));
        assert!(lines[1].contains("13000"));
    }

    #[test]
    fn test_empty_program_renders_empty() {
        assert_eq!(render(&[]), "");
    }
}
