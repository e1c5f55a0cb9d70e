use std::io::{self, BufRead, Write};

/// What the operator chose for one duplicate group.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Merge; `Some` keeps the given member id or name instead of the suggestion.
    Accept(Option<String>),
    Skip,
    Quit,
}

pub fn parse_decision(input: &str) -> Option<Decision> {
    let input = input.trim();
    let (command, rest) = input
        .split_once(char::is_whitespace)
        .map(|(c, r)| (c, r.trim()))
        .unwrap_or((input, ""));
    match command.to_lowercase().as_str() {
        "a" | "accept" | "y" | "yes" => Some(Decision::Accept(None)),
        "s" | "skip" | "n" | "no" | "" => Some(Decision::Skip),
        "q" | "quit" => Some(Decision::Quit),
        "p" | "prefer" if !rest.is_empty() => Some(Decision::Accept(Some(rest.to_string()))),
        _ => None,
    }
}

/// Asks until the answer parses; end of input counts as quit.
pub fn ask_decision(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<Decision> {
    loop {
        write!(output, "  [a]ccept / [s]kip / [p]refer <id|name> / [q]uit > ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(Decision::Quit);
        }
        match parse_decision(&line) {
            Some(decision) => return Ok(decision),
            None => writeln!(output, "  unrecognized answer: {}", line.trim())?,
        }
    }
}

pub fn confirm(question: &str, input: &mut impl BufRead, output: &mut impl Write) -> io::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_answers() {
        assert_eq!(parse_decision("a"), Some(Decision::Accept(None)));
        assert_eq!(parse_decision(""), Some(Decision::Skip));
        assert_eq!(
            parse_decision("p AC/DC"),
            Some(Decision::Accept(Some("AC/DC".into())))
        );
        assert_eq!(parse_decision("prefer"), None);
        assert_eq!(parse_decision("Q\n"), Some(Decision::Quit));
    }

    #[test]
    fn reasks_until_valid() {
        let mut input = Cursor::new("maybe\nprefer a2\n");
        let mut output = Vec::new();
        let decision = ask_decision(&mut input, &mut output).unwrap();
        assert_eq!(decision, Decision::Accept(Some("a2".into())));
        assert!(String::from_utf8(output).unwrap().contains("unrecognized answer: maybe"));
    }

    #[test]
    fn end_of_input_quits() {
        let mut output = Vec::new();
        assert_eq!(
            ask_decision(&mut Cursor::new(""), &mut output).unwrap(),
            Decision::Quit
        );
        assert!(!confirm("Delete?", &mut Cursor::new(""), &mut output).unwrap());
    }
}
