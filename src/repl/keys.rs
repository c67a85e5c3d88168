use std::io::{self, Read};

/// Semantic edit action decoded from one raw input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Insert(char),
    Backspace,
    Tab,
    Enter,
    HistoryUp,
    HistoryDown,
    Ignore,
}

/// Read one key event from the raw byte stream. Returns `None` when the
/// stream is exhausted.
///
/// An ESC prefix consumes two further bytes to decode the arrow-key
/// sequences, so a bare ESC press blocks until more input arrives.
pub fn read_action(input: &mut dyn Read) -> io::Result<Option<KeyAction>> {
    let Some(byte) = read_byte(input)? else {
        return Ok(None);
    };
    let action = match byte {
        b'\n' | b'\r' => KeyAction::Enter,
        b'\t' => KeyAction::Tab,
        127 | 8 => KeyAction::Backspace,
        27 => {
            let second = read_byte(input)?;
            let third = read_byte(input)?;
            match (second, third) {
                (Some(b'['), Some(b'A')) => KeyAction::HistoryUp,
                (Some(b'['), Some(b'B')) => KeyAction::HistoryDown,
                _ => KeyAction::Ignore,
            }
        }
        b if b >= 32 => KeyAction::Insert(b as char),
        _ => KeyAction::Ignore,
    };
    Ok(Some(action))
}

fn read_byte(input: &mut dyn Read) -> io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match input.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode(bytes: &[u8]) -> Option<KeyAction> {
        read_action(&mut Cursor::new(bytes.to_vec())).unwrap()
    }

    #[test]
    fn printable_bytes_insert() {
        assert_eq!(decode(b"a"), Some(KeyAction::Insert('a')));
        assert_eq!(decode(b" "), Some(KeyAction::Insert(' ')));
        assert_eq!(decode(b"~"), Some(KeyAction::Insert('~')));
    }

    #[test]
    fn enter_from_cr_and_lf() {
        assert_eq!(decode(b"\r"), Some(KeyAction::Enter));
        assert_eq!(decode(b"\n"), Some(KeyAction::Enter));
    }

    #[test]
    fn tab_and_backspace() {
        assert_eq!(decode(b"\t"), Some(KeyAction::Tab));
        assert_eq!(decode(&[127]), Some(KeyAction::Backspace));
        assert_eq!(decode(&[8]), Some(KeyAction::Backspace));
    }

    #[test]
    fn arrow_escape_sequences() {
        assert_eq!(decode(b"\x1b[A"), Some(KeyAction::HistoryUp));
        assert_eq!(decode(b"\x1b[B"), Some(KeyAction::HistoryDown));
    }

    #[test]
    fn unknown_escape_sequence_is_ignored() {
        assert_eq!(decode(b"\x1b[C"), Some(KeyAction::Ignore));
        assert_eq!(decode(b"\x1bOP"), Some(KeyAction::Ignore));
    }

    #[test]
    fn control_bytes_are_ignored() {
        assert_eq!(decode(&[1]), Some(KeyAction::Ignore));
        assert_eq!(decode(&[31]), Some(KeyAction::Ignore));
    }

    #[test]
    fn exhausted_stream_reports_end_of_input() {
        assert_eq!(decode(b""), None);
    }

    #[test]
    fn escape_consumes_exactly_two_follow_up_bytes() {
        let mut input = Cursor::new(b"\x1b[Ax".to_vec());
        assert_eq!(
            read_action(&mut input).unwrap(),
            Some(KeyAction::HistoryUp)
        );
        assert_eq!(
            read_action(&mut input).unwrap(),
            Some(KeyAction::Insert('x'))
        );
    }
}
