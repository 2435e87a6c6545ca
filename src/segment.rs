// Segment codec: the on-disk slice container format.
//
// Layout: a stream of framed segments, `[type-len u32 BE | type bytes | data-len u32 BE |
// crc32 u32 BE | data bytes]`, followed by an xref segment describing the offset/length/crc
// of every segment (including itself is not recorded; the xref always lives at the tail and
// is rewritten whole on every append), followed by a fixed 12-byte trailer: xref-offset
// (u64 BE) and a magic constant (u32 BE) to detect truncation.

use crate::error::{DfsError, DfsResult};
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom, Write};

pub const TRAILER_MAGIC: u32 = 0x534C_4358; // "SLCX"
const TRAILER_LEN: u64 = 12;
const XREF_TYPE: &str = "XREF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrefEntry {
    pub offset: u64,
    pub length: u32,
    pub crc: u32,
}

/// Maps segment type name to its location in the container.
pub type XrefTable = BTreeMap<String, XrefEntry>;

/// A segmented slice container backed by any seekable read/write stream.
pub struct SliceContainer<S> {
    stream: S,
    max_xref_entries: usize,
}

impl<S: Read + Write + Seek> SliceContainer<S> {
    /// Wraps a fresh, empty stream. Use [`SliceContainer::open`] for an existing one.
    pub fn create(stream: S, max_xref_entries: usize) -> DfsResult<Self> {
        let mut container = SliceContainer {
            stream,
            max_xref_entries,
        };
        container.write_xref(&XrefTable::new())?;
        Ok(container)
    }

    /// Opens an existing container, validating the trailer.
    pub fn open(mut stream: S, max_xref_entries: usize) -> DfsResult<Self> {
        let _ = read_xref(&mut stream)?;
        Ok(SliceContainer {
            stream,
            max_xref_entries,
        })
    }

    fn xref(&mut self) -> DfsResult<XrefTable> {
        read_xref(&mut self.stream)
    }

    /// Appends a single named segment, rewriting the xref to include it.
    pub fn append(&mut self, segment_type: &str, data: &[u8]) -> DfsResult<()> {
        self.append_many(&[(segment_type, data)])
    }

    /// Appends several segments atomically with respect to the xref: the xref is
    /// rewritten exactly once, after all new segments are laid down.
    pub fn append_many(&mut self, segments: &[(&str, &[u8])]) -> DfsResult<()> {
        let mut xref = self.xref()?;
        // +1 accounts for the XREF segment itself, which always occupies a slot.
        if xref.len() + segments.len() + 1 > self.max_xref_entries {
            return Err(DfsError::XrefFull);
        }

        // The current xref occupies the tail; new segments overwrite it, then a
        // fresh xref (old entries + new ones) is appended after them.
        let append_at = self.current_xref_offset()?;

        self.stream.seek(SeekFrom::Start(append_at))?;
        for (segment_type, data) in segments {
            let seg_offset = self.stream.stream_position()?;
            let entry = write_segment(&mut self.stream, seg_offset, segment_type, data)?;
            xref.insert(segment_type.to_string(), entry);
        }
        let new_xref_offset = self.stream.stream_position()?;
        self.write_xref_at(&xref, new_xref_offset)?;
        Ok(())
    }

    fn current_xref_offset(&mut self) -> DfsResult<u64> {
        let len = self.stream.seek(SeekFrom::End(0))?;
        if len < TRAILER_LEN {
            return Ok(0);
        }
        self.stream.seek(SeekFrom::Start(len - TRAILER_LEN))?;
        let offset = read_u64(&mut self.stream)?;
        let magic = read_u32(&mut self.stream)?;
        if magic != TRAILER_MAGIC {
            return Err(DfsError::FormatError("bad trailer magic".into()));
        }
        Ok(offset)
    }

    fn write_xref(&mut self, table: &XrefTable) -> DfsResult<()> {
        self.write_xref_at(table, 0)
    }

    fn write_xref_at(&mut self, table: &XrefTable, offset: u64) -> DfsResult<()> {
        self.stream.seek(SeekFrom::Start(offset))?;
        let payload = encode_xref(table);
        write_segment(&mut self.stream, offset, XREF_TYPE, &payload)?;
        write_u64(&mut self.stream, offset)?;
        write_u32(&mut self.stream, TRAILER_MAGIC)?;
        Ok(())
    }

    /// Reads a single named segment, verifying its CRC.
    pub fn read(&mut self, segment_type: &str) -> DfsResult<Vec<u8>> {
        let xref = self.xref()?;
        let entry = xref
            .get(segment_type)
            .ok_or_else(|| DfsError::MissingSegment(segment_type.to_string()))?;
        read_segment_at(&mut self.stream, entry.offset, segment_type)
    }

    /// Reads several named segments in one pass over the xref.
    pub fn read_many(&mut self, segment_types: &[&str]) -> DfsResult<Vec<Vec<u8>>> {
        let xref = self.xref()?;
        segment_types
            .iter()
            .map(|t| {
                let entry = xref
                    .get(*t)
                    .ok_or_else(|| DfsError::MissingSegment(t.to_string()))?;
                read_segment_at(&mut self.stream, entry.offset, t)
            })
            .collect()
    }

    /// Enumerates all segment types present, including the xref segment itself.
    pub fn segment_types(&mut self) -> DfsResult<Vec<String>> {
        let xref = self.xref()?;
        let mut types: Vec<String> = xref.keys().cloned().collect();
        types.push(XREF_TYPE.to_string());
        Ok(types)
    }

    /// Unwraps the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Corrupts the CRC of a given segment in place (test helper, matches S1's tamper step).
pub fn tamper_crc<S: Read + Write + Seek>(stream: &mut S, segment_type: &str) -> DfsResult<()> {
    let xref = read_xref(stream)?;
    let entry = xref
        .get(segment_type)
        .ok_or_else(|| DfsError::MissingSegment(segment_type.to_string()))?;
    // crc sits right after type-len + type + data-len, see write_segment layout.
    let crc_pos = entry.offset + 4 + segment_type.len() as u64 + 4;
    stream.seek(SeekFrom::Start(crc_pos))?;
    let mut byte = [0u8; 1];
    stream.read_exact(&mut byte)?;
    stream.seek(SeekFrom::Start(crc_pos))?;
    stream.write_all(&[byte[0] ^ 0xFF])?;
    Ok(())
}

fn write_segment<S: Write + Seek>(
    stream: &mut S,
    offset: u64,
    segment_type: &str,
    data: &[u8],
) -> DfsResult<XrefEntry> {
    let crc = crc32fast::hash(data);
    write_u32(stream, segment_type.len() as u32)?;
    stream.write_all(segment_type.as_bytes())?;
    write_u32(stream, data.len() as u32)?;
    write_u32(stream, crc)?;
    stream.write_all(data)?;
    Ok(XrefEntry {
        offset,
        length: data.len() as u32,
        crc,
    })
}

fn read_segment_at<S: Read + Seek>(
    stream: &mut S,
    offset: u64,
    expected_type: &str,
) -> DfsResult<Vec<u8>> {
    stream.seek(SeekFrom::Start(offset))?;
    let type_len = read_u32(stream)?;
    let mut type_bytes = vec![0u8; type_len as usize];
    stream.read_exact(&mut type_bytes)?;
    let actual_type = String::from_utf8(type_bytes)
        .map_err(|e| DfsError::FormatError(format!("non-utf8 segment type: {}", e)))?;
    if actual_type != expected_type {
        return Err(DfsError::FormatError(format!(
            "xref pointed at {} but found {}",
            expected_type, actual_type
        )));
    }
    let data_len = read_u32(stream)?;
    let crc = read_u32(stream)?;
    let mut data = vec![0u8; data_len as usize];
    stream.read_exact(&mut data)?;
    if crc32fast::hash(&data) != crc {
        return Err(DfsError::CorruptSegment(expected_type.to_string()));
    }
    Ok(data)
}

fn read_xref<S: Read + Seek>(stream: &mut S) -> DfsResult<XrefTable> {
    let len = stream.seek(SeekFrom::End(0))?;
    if len < TRAILER_LEN {
        return Err(DfsError::FormatError("container shorter than trailer".into()));
    }
    stream.seek(SeekFrom::Start(len - TRAILER_LEN))?;
    let xref_offset = read_u64(stream)?;
    let magic = read_u32(stream)?;
    if magic != TRAILER_MAGIC {
        return Err(DfsError::FormatError("bad trailer magic".into()));
    }
    let payload = read_segment_at(stream, xref_offset, XREF_TYPE)?;
    decode_xref(&payload)
}

fn encode_xref(table: &XrefTable) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(table.len() as u32).to_be_bytes());
    for (name, entry) in table {
        buf.extend_from_slice(&(name.len() as u32).to_be_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&entry.offset.to_be_bytes());
        buf.extend_from_slice(&entry.length.to_be_bytes());
        buf.extend_from_slice(&entry.crc.to_be_bytes());
    }
    buf
}

fn decode_xref(payload: &[u8]) -> DfsResult<XrefTable> {
    let mut cursor = payload;
    let count = take_u32(&mut cursor)?;
    let mut table = XrefTable::new();
    for _ in 0..count {
        let name_len = take_u32(&mut cursor)? as usize;
        if cursor.len() < name_len {
            return Err(DfsError::FormatError("truncated xref entry".into()));
        }
        let name = String::from_utf8(cursor[..name_len].to_vec())
            .map_err(|e| DfsError::FormatError(format!("non-utf8 xref name: {}", e)))?;
        cursor = &cursor[name_len..];
        let offset = take_u64(&mut cursor)?;
        let length = take_u32(&mut cursor)?;
        let crc = take_u32(&mut cursor)?;
        table.insert(name, XrefEntry { offset, length, crc });
    }
    Ok(table)
}

fn take_u32(cursor: &mut &[u8]) -> DfsResult<u32> {
    if cursor.len() < 4 {
        return Err(DfsError::FormatError("truncated xref".into()));
    }
    let (head, tail) = cursor.split_at(4);
    *cursor = tail;
    Ok(u32::from_be_bytes(head.try_into().unwrap()))
}

fn take_u64(cursor: &mut &[u8]) -> DfsResult<u64> {
    if cursor.len() < 8 {
        return Err(DfsError::FormatError("truncated xref".into()));
    }
    let (head, tail) = cursor.split_at(8);
    *cursor = tail;
    Ok(u64::from_be_bytes(head.try_into().unwrap()))
}

fn read_u32<S: Read>(stream: &mut S) -> DfsResult<u32> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64<S: Read>(stream: &mut S) -> DfsResult<u64> {
    let mut buf = [0u8; 8];
    stream.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

fn write_u32<S: Write>(stream: &mut S, v: u32) -> DfsResult<()> {
    stream.write_all(&v.to_be_bytes())?;
    Ok(())
}

fn write_u64<S: Write>(stream: &mut S, v: u64) -> DfsResult<()> {
    stream.write_all(&v.to_be_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn new_container() -> SliceContainer<Cursor<Vec<u8>>> {
        SliceContainer::create(Cursor::new(Vec::new()), 64).unwrap()
    }

    #[test]
    fn round_trip_segments() {
        let mut c = new_container();
        c.append("FILEID", b"abc").unwrap();
        c.append("NAME", b"hello.txt").unwrap();
        assert_eq!(c.read("FILEID").unwrap(), b"abc");
        assert_eq!(c.read("NAME").unwrap(), b"hello.txt");
        let mut types = c.segment_types().unwrap();
        types.sort();
        assert_eq!(types, vec!["FILEID".to_string(), "NAME".to_string(), "XREF".to_string()]);
    }

    #[test]
    fn tampered_crc_is_detected() {
        let mut c = new_container();
        c.append("FILEID", b"abc").unwrap();
        tamper_crc(&mut c.stream, "FILEID").unwrap();
        match c.read("FILEID") {
            Err(DfsError::CorruptSegment(t)) => assert_eq!(t, "FILEID"),
            other => panic!("expected CorruptSegment, got {:?}", other),
        }
    }

    #[test]
    fn missing_segment_errors() {
        let mut c = new_container();
        match c.read("NOPE") {
            Err(DfsError::MissingSegment(t)) => assert_eq!(t, "NOPE"),
            other => panic!("expected MissingSegment, got {:?}", other),
        }
    }

    #[test]
    fn xref_full_is_enforced() {
        let mut c = SliceContainer::create(Cursor::new(Vec::new()), 2).unwrap();
        c.append("A", b"1").unwrap();
        match c.append("B", b"2") {
            Err(DfsError::XrefFull) => {}
            other => panic!("expected XrefFull, got {:?}", other),
        }
    }

    #[test]
    fn previous_segments_survive_further_appends() {
        let mut c = new_container();
        for i in 0..5 {
            c.append(&format!("SEG{}", i), format!("payload{}", i).as_bytes())
                .unwrap();
        }
        for i in 0..5 {
            let data = c.read(&format!("SEG{}", i)).unwrap();
            assert_eq!(data, format!("payload{}", i).as_bytes());
        }
    }
}
