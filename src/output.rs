//! Terminal output for filter results

use crate::search::{MatchResult, Origin};
use std::io;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Print results to stdout, one per line, matched characters highlighted
pub fn print_results(results: &[MatchResult], color: bool) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);
    write_results(&mut stdout, results)
}

/// Write results as `origin:score:text`
pub fn write_results<W: WriteColor>(out: &mut W, results: &[MatchResult]) -> io::Result<()> {
    for result in results {
        write_result(out, result)?;
    }
    Ok(())
}

fn write_result<W: WriteColor>(out: &mut W, result: &MatchResult) -> io::Result<()> {
    let origin_color = match result.origin {
        Origin::List => Color::Magenta,
        Origin::Command => Color::Cyan,
    };
    out.set_color(ColorSpec::new().set_fg(Some(origin_color)))?;
    write!(out, "{}", result.origin)?;
    out.reset()?;
    write!(out, ":")?;

    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
    write!(out, "{}", result.score)?;
    out.reset()?;
    write!(out, ":")?;

    // Positions are ascending char indices
    let mut positions = result.positions.iter().peekable();
    for (i, c) in result.text.chars().enumerate() {
        if positions.peek() == Some(&&i) {
            positions.next();
            out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
            write!(out, "{}", c)?;
            out.reset()?;
        } else {
            write!(out, "{}", c)?;
        }
    }

    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::{Buffer, NoColor};

    fn result(origin: Origin, text: &str, score: i32, positions: Vec<usize>) -> MatchResult {
        MatchResult {
            origin,
            text: text.to_string(),
            score,
            positions,
        }
    }

    #[test]
    fn test_plain_output() {
        let mut out = NoColor::new(Vec::new());
        write_results(
            &mut out,
            &[
                result(Origin::Command, "grape", 36, vec![2, 3]),
                result(Origin::List, "apple", 62, vec![0, 1]),
            ],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out.into_inner()).unwrap(),
            "command:36:grape\nlist:62:apple\n"
        );
    }

    #[test]
    fn test_highlight_wraps_matched_chars() {
        let mut out = Buffer::ansi();
        write_results(&mut out, &[result(Origin::List, "Müller", 40, vec![2, 3])]).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();

        assert!(text.contains("Mü"));
        assert!(text.contains("\x1b[31ml\x1b[0m"));
        assert!(!text.contains("\x1b[31me"));
        assert!(text.ends_with("er\n"));
    }
}
