use std::collections::VecDeque;
use std::io::BufRead;

use crate::{Encoding, ReaderError};

const BOM_UTF8: [u8; 3] = [0xef, 0xbb, 0xbf];
const BOM_UTF16LE: [u8; 2] = [0xff, 0xfe];
const BOM_UTF16BE: [u8; 2] = [0xfe, 0xff];

/// Decodes the raw input into a queue of characters for the scanner.
pub(crate) struct Reader<'r> {
    input: Option<&'r mut dyn BufRead>,
    pub(crate) encoding: Encoding,
    /// Decoded characters not yet consumed by the scanner.
    pub(crate) buffer: VecDeque<char>,
    /// Byte offset of the end of `buffer` in the raw input.
    offset: usize,
    eof: bool,
}

impl<'r> Reader<'r> {
    pub(crate) fn new(input: Option<&'r mut dyn BufRead>) -> Reader<'r> {
        Reader {
            eof: input.is_none(),
            input,
            encoding: Encoding::Any,
            buffer: VecDeque::with_capacity(crate::INPUT_BUFFER_SIZE),
            offset: 0,
        }
    }

    /// Make sure at least `length` characters are buffered, unless the input
    /// ends first.
    pub(crate) fn cache(&mut self, length: usize) -> Result<(), ReaderError> {
        if self.buffer.len() >= length || self.eof {
            return Ok(());
        }
        let Some(input) = self.input.as_deref_mut() else {
            self.eof = true;
            return Ok(());
        };

        if self.encoding == Encoding::Any {
            if let Some(encoding) = determine_encoding(input)? {
                self.encoding = encoding;
            } else {
                self.eof = true;
                return Ok(());
            }
        }

        while self.buffer.len() < length {
            let not_eof = match self.encoding {
                Encoding::Any | Encoding::Utf8 => {
                    read_utf8_buffered(input, &mut self.buffer, &mut self.offset)?
                }
                Encoding::Utf16Le => {
                    read_utf16_buffered::<false>(input, &mut self.buffer, &mut self.offset)?
                }
                Encoding::Utf16Be => {
                    read_utf16_buffered::<true>(input, &mut self.buffer, &mut self.offset)?
                }
            };
            if !not_eof {
                self.eof = true;
                return Ok(());
            }
        }
        Ok(())
    }

    pub(crate) fn get(&self, index: usize) -> Option<char> {
        self.buffer.get(index).copied()
    }

    pub(crate) fn check(&self, ch: char) -> bool {
        self.get(0) == Some(ch)
    }

    pub(crate) fn check_at(&self, ch: char, index: usize) -> bool {
        self.get(index) == Some(ch)
    }

    pub(crate) fn starts_with(&self, prefix: &[char]) -> bool {
        prefix
            .iter()
            .enumerate()
            .all(|(index, ch)| self.check_at(*ch, index))
    }
}

fn determine_encoding(reader: &mut dyn BufRead) -> Result<Option<Encoding>, ReaderError> {
    let initial_bytes = reader.fill_buf()?;
    if initial_bytes.is_empty() {
        return Ok(None);
    }

    match initial_bytes[0] {
        0xef => {
            let mut bom = [0; 3];
            reader.read_exact(&mut bom)?;
            if bom == BOM_UTF8 {
                Ok(Some(Encoding::Utf8))
            } else {
                Err(ReaderError::InvalidBom)
            }
        }
        0xff | 0xfe => {
            let mut bom = [0; 2];
            reader.read_exact(&mut bom)?;
            if bom == BOM_UTF16LE {
                Ok(Some(Encoding::Utf16Le))
            } else if bom == BOM_UTF16BE {
                Ok(Some(Encoding::Utf16Be))
            } else {
                Err(ReaderError::InvalidBom)
            }
        }
        _ => Ok(Some(Encoding::Utf8)),
    }
}

fn read_utf8_buffered(
    reader: &mut dyn BufRead,
    out: &mut VecDeque<char>,
    offset: &mut usize,
) -> Result<bool, ReaderError> {
    let available = loop {
        match reader.fill_buf() {
            Ok([]) => return Ok(false),
            Ok(available) => break available,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    };

    let (valid, error) = match core::str::from_utf8(available) {
        Ok(valid) => (valid, None),
        Err(err) => {
            let valid_bytes = err.valid_up_to();
            let Ok(valid) = core::str::from_utf8(&available[..valid_bytes]) else {
                unreachable!("valid_up_to() always marks a valid prefix")
            };
            (valid, Some((err, available[valid_bytes])))
        }
    };

    let used = valid.len();
    for ch in valid.chars() {
        push_char(out, ch, *offset)?;
        *offset += ch.len_utf8();
    }

    match error {
        None => {
            reader.consume(used);
            Ok(true)
        }
        Some((err, value)) if err.error_len().is_some() => Err(ReaderError::InvalidUtf8 { value }),
        Some((_, initial)) => {
            if used != 0 {
                // The tail of the buffer is an incomplete sequence; leave it
                // for the next read.
                reader.consume(used);
            } else {
                read_utf8_char_unbuffered(reader, out, initial, offset)?;
            }
            Ok(true)
        }
    }
}

fn read_utf8_char_unbuffered(
    reader: &mut dyn BufRead,
    out: &mut VecDeque<char>,
    initial: u8,
    offset: &mut usize,
) -> Result<(), ReaderError> {
    let width = utf8_char_width(initial);
    if width == 0 {
        return Err(ReaderError::InvalidUtf8 { value: initial });
    }
    let mut buffer = [0; 4];
    reader.read_exact(&mut buffer[..width])?;
    match core::str::from_utf8(&buffer[..width])
        .ok()
        .and_then(|valid| valid.chars().next())
    {
        Some(ch) => {
            push_char(out, ch, *offset)?;
            *offset += width;
            Ok(())
        }
        None => Err(ReaderError::InvalidUtf8 { value: buffer[0] }),
    }
}

fn read_utf16_buffered<const BIG_ENDIAN: bool>(
    reader: &mut dyn BufRead,
    out: &mut VecDeque<char>,
    offset: &mut usize,
) -> Result<bool, ReaderError> {
    let available = loop {
        match reader.fill_buf() {
            Ok([]) => return Ok(false),
            Ok(available) => break available,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    };

    let units = available.chunks_exact(2).map(|chunk| {
        if BIG_ENDIAN {
            u16::from_be_bytes([chunk[0], chunk[1]])
        } else {
            u16::from_le_bytes([chunk[0], chunk[1]])
        }
    });

    let mut used = 0;
    for ch in core::char::decode_utf16(units) {
        // An unpaired surrogate may just be the first half of a pair split
        // across buffers; it is handled by the unbuffered path below.
        let Ok(ch) = ch else {
            break;
        };
        push_char(out, ch, *offset)?;
        let width = ch.len_utf16() * 2;
        *offset += width;
        used += width;
    }

    if used != 0 {
        reader.consume(used);
    } else {
        read_utf16_char_unbuffered::<BIG_ENDIAN>(reader, out, offset)?;
    }
    Ok(true)
}

fn read_utf16_char_unbuffered<const BIG_ENDIAN: bool>(
    reader: &mut dyn BufRead,
    out: &mut VecDeque<char>,
    offset: &mut usize,
) -> Result<(), ReaderError> {
    let decode = |buffer: [u8; 2]| {
        if BIG_ENDIAN {
            u16::from_be_bytes(buffer)
        } else {
            u16::from_le_bytes(buffer)
        }
    };

    let mut buffer = [0; 2];
    reader.read_exact(&mut buffer)?;
    let first = decode(buffer);
    let (units, width) = if is_utf16_surrogate(first) {
        reader.read_exact(&mut buffer)?;
        (vec![first, decode(buffer)], 4)
    } else {
        (vec![first], 2)
    };

    match core::char::decode_utf16(units).next() {
        Some(Ok(ch)) => {
            push_char(out, ch, *offset)?;
            *offset += width;
            Ok(())
        }
        Some(Err(err)) => Err(ReaderError::InvalidUtf16 {
            value: err.unpaired_surrogate(),
        }),
        None => Err(ReaderError::InvalidUtf16 { value: first }),
    }
}

pub(crate) fn utf8_char_width(initial: u8) -> usize {
    if initial & 0x80 == 0 {
        1
    } else if initial & 0xE0 == 0xC0 {
        2
    } else if initial & 0xF0 == 0xE0 {
        3
    } else if initial & 0xF8 == 0xF0 {
        4
    } else {
        0
    }
}

fn is_utf16_surrogate(value: u16) -> bool {
    matches!(value, 0xD800..=0xDFFF)
}

fn push_char(out: &mut VecDeque<char>, ch: char, offset: usize) -> Result<(), ReaderError> {
    if !(ch == '\x09'
        || ch == '\x0A'
        || ch == '\x0D'
        || ch >= '\x20' && ch <= '\x7E'
        || ch == '\u{0085}'
        || ch >= '\u{00A0}' && ch <= '\u{D7FF}'
        || ch >= '\u{E000}' && ch <= '\u{FFFD}'
        || ch >= '\u{10000}' && ch <= '\u{10FFFF}')
    {
        return Err(ReaderError::Problem {
            problem: "control characters are not allowed",
            offset,
            value: ch as i32,
        });
    }
    out.push_back(ch);
    Ok(())
}
