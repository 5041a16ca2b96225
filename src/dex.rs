//! DEX (Dalvik bytecode container) parsing: header validation, method
//! code-item extents, and pretty method-signature printing.
//!
//! The header field layout is grounded on the DEX format (magic, checksum,
//! 20-byte SHA-1 signature, file_size, header_size, endian_tag, then the
//! six `(size, off)` pairs for string/type/proto/field/method/class_def
//! tables); this engine reads it with `byteorder` to stay aligned with the
//! teacher's existing dependency stack rather than pulling in a
//! parser-combinator crate.

use std::rc::Rc;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::interner::NameInterner;
use crate::symbol::Symbol;

const DEX_MAGIC_PREFIX: &[u8; 4] = b"dex\n";
const HEADER_SIZE: usize = 0x70;
const ENDIAN_CONSTANT: u32 = 0x12345678;

struct DexHeader {
    file_size: u32,
    string_ids_size: u32,
    string_ids_off: u32,
    type_ids_size: u32,
    type_ids_off: u32,
    proto_ids_size: u32,
    proto_ids_off: u32,
    method_ids_size: u32,
    method_ids_off: u32,
    class_defs_size: u32,
    class_defs_off: u32,
}

fn parse_header(data: &[u8]) -> Option<DexHeader> {
    if data.len() < HEADER_SIZE {
        return None;
    }
    if &data[0..4] != DEX_MAGIC_PREFIX || data[7] != 0x00 {
        return None;
    }
    let endian_tag = LittleEndian::read_u32(&data[40..44]);
    if endian_tag != ENDIAN_CONSTANT {
        // Reverse-endian DEX files exist but are rare on Android; treat
        // them as malformed rather than implementing a second code path.
        return None;
    }
    Some(DexHeader {
        file_size: LittleEndian::read_u32(&data[32..36]),
        string_ids_size: LittleEndian::read_u32(&data[56..60]),
        string_ids_off: LittleEndian::read_u32(&data[60..64]),
        type_ids_size: LittleEndian::read_u32(&data[64..68]),
        type_ids_off: LittleEndian::read_u32(&data[68..72]),
        proto_ids_size: LittleEndian::read_u32(&data[72..76]),
        proto_ids_off: LittleEndian::read_u32(&data[76..80]),
        method_ids_size: LittleEndian::read_u32(&data[88..92]),
        method_ids_off: LittleEndian::read_u32(&data[92..96]),
        class_defs_size: LittleEndian::read_u32(&data[96..100]),
        class_defs_off: LittleEndian::read_u32(&data[100..104]),
    })
}

fn read_uleb128(data: &[u8], pos: &mut usize) -> Option<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *data.get(*pos)?;
        *pos += 1;
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Some(value)
}

fn read_mutf8_string(data: &[u8], offset: usize) -> Option<String> {
    let mut pos = offset;
    let _utf16_len = read_uleb128(data, &mut pos)?;
    let start = pos;
    let end = data[start..].iter().position(|&b| b == 0)? + start;
    Some(String::from_utf8_lossy(&data[start..end]).into_owned())
}

fn get_string(data: &[u8], header: &DexHeader, idx: u32) -> Option<String> {
    if idx >= header.string_ids_size {
        return None;
    }
    let entry_off = header.string_ids_off as usize + idx as usize * 4;
    let str_off = LittleEndian::read_u32(data.get(entry_off..entry_off + 4)?) as usize;
    read_mutf8_string(data, str_off)
}

fn get_type_descriptor(data: &[u8], header: &DexHeader, type_idx: u32) -> Option<String> {
    if type_idx >= header.type_ids_size {
        return None;
    }
    let entry_off = header.type_ids_off as usize + type_idx as usize * 4;
    let string_idx = LittleEndian::read_u32(data.get(entry_off..entry_off + 4)?);
    get_string(data, header, string_idx)
}

/// Converts a class descriptor like `Lpkg/Outer$Inner;` into the dotted
/// Java name `pkg.Outer$Inner`. Nested/anonymous classes keep their `$`.
fn class_descriptor_to_java_name(descriptor: &str) -> String {
    descriptor
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .unwrap_or(descriptor)
        .replace('/', ".")
}

struct MethodIdItem {
    class_idx: u16,
    proto_idx: u16,
    name_idx: u32,
}

fn get_method_id(data: &[u8], header: &DexHeader, method_idx: u32) -> Option<MethodIdItem> {
    if method_idx >= header.method_ids_size {
        return None;
    }
    let entry_off = header.method_ids_off as usize + method_idx as usize * 8;
    let entry = data.get(entry_off..entry_off + 8)?;
    Some(MethodIdItem {
        class_idx: LittleEndian::read_u16(&entry[0..2]),
        proto_idx: LittleEndian::read_u16(&entry[2..4]),
        name_idx: LittleEndian::read_u32(&entry[4..8]),
    })
}

/// Converts one field/return-type descriptor to its pretty Java spelling:
/// primitives to their keyword, `[` prefixes to trailing `[]`, and `L...;`
/// class descriptors via [`class_descriptor_to_java_name`].
fn descriptor_to_pretty(descriptor: &str) -> String {
    let dims = descriptor.chars().take_while(|&c| c == '[').count();
    let base = &descriptor[dims..];
    let base_name = match base.chars().next() {
        Some('V') => "void".to_string(),
        Some('Z') => "boolean".to_string(),
        Some('B') => "byte".to_string(),
        Some('S') => "short".to_string(),
        Some('C') => "char".to_string(),
        Some('I') => "int".to_string(),
        Some('J') => "long".to_string(),
        Some('F') => "float".to_string(),
        Some('D') => "double".to_string(),
        Some('L') => class_descriptor_to_java_name(base),
        _ => base.to_string(),
    };
    base_name + &"[]".repeat(dims)
}

/// Reads a proto_id's `parameters_off` type_list (a `u32` size followed by
/// that many `u16` type indices) and pretty-prints it as `(T1, T2)`. A
/// no-argument method contributes an empty suffix rather than a literal
/// `()`, matching how this engine's method names are expected to read
/// when there is nothing to disambiguate.
fn pretty_parameters(data: &[u8], header: &DexHeader, proto_idx: u16) -> Option<String> {
    if proto_idx as u32 >= header.proto_ids_size {
        return None;
    }
    let entry_off = header.proto_ids_off as usize + proto_idx as usize * 12;
    let entry = data.get(entry_off..entry_off + 12)?;
    let parameters_off = LittleEndian::read_u32(&entry[8..12]);
    if parameters_off == 0 {
        return Some(String::new());
    }
    let list_header = data.get(parameters_off as usize..parameters_off as usize + 4)?;
    let size = LittleEndian::read_u32(list_header);
    if size == 0 {
        return Some(String::new());
    }
    let mut params = Vec::with_capacity(size as usize);
    for i in 0..size {
        let idx_off = parameters_off as usize + 4 + i as usize * 2;
        let type_idx = LittleEndian::read_u16(data.get(idx_off..idx_off + 2)?) as u32;
        let descriptor = get_type_descriptor(data, header, type_idx)?;
        params.push(descriptor_to_pretty(&descriptor));
    }
    Some(format!("({})", params.join(", ")))
}

fn method_pretty_name(data: &[u8], header: &DexHeader, method_idx: u32) -> Option<String> {
    let method_id = get_method_id(data, header, method_idx)?;
    let class_descriptor = get_type_descriptor(data, header, method_id.class_idx as u32)?;
    let class_name = class_descriptor_to_java_name(&class_descriptor);
    let method_name = get_string(data, header, method_id.name_idx)?;
    let parameters = pretty_parameters(data, header, method_id.proto_idx).unwrap_or_default();
    Some(format!("{class_name}.{method_name}{parameters}"))
}

struct EncodedMethod {
    method_idx: u32,
    code_off: u32,
}

fn read_encoded_methods(data: &[u8], pos: &mut usize, count: u64) -> Option<Vec<EncodedMethod>> {
    let mut methods = Vec::with_capacity(count as usize);
    let mut method_idx_acc: u64 = 0;
    for _ in 0..count {
        let diff = read_uleb128(data, pos)?;
        let _access_flags = read_uleb128(data, pos)?;
        let code_off = read_uleb128(data, pos)?;
        method_idx_acc += diff;
        methods.push(EncodedMethod {
            method_idx: method_idx_acc as u32,
            code_off: code_off as u32,
        });
    }
    Some(methods)
}

fn skip_encoded_fields(data: &[u8], pos: &mut usize, count: u64) -> Option<()> {
    for _ in 0..count {
        read_uleb128(data, pos)?;
        read_uleb128(data, pos)?;
    }
    Some(())
}

fn class_data_methods(data: &[u8], class_data_off: u32) -> Option<Vec<EncodedMethod>> {
    if class_data_off == 0 {
        return Some(Vec::new());
    }
    let mut pos = class_data_off as usize;
    let static_fields_size = read_uleb128(data, &mut pos)?;
    let instance_fields_size = read_uleb128(data, &mut pos)?;
    let direct_methods_size = read_uleb128(data, &mut pos)?;
    let virtual_methods_size = read_uleb128(data, &mut pos)?;

    skip_encoded_fields(data, &mut pos, static_fields_size)?;
    skip_encoded_fields(data, &mut pos, instance_fields_size)?;
    let mut methods = read_encoded_methods(data, &mut pos, direct_methods_size)?;
    methods.extend(read_encoded_methods(data, &mut pos, virtual_methods_size)?);
    Some(methods)
}

/// `insns_size` lives 12 bytes into `code_item`; the instruction stream
/// (2 bytes per code unit) starts 4 bytes after that.
fn code_item_insns_size(data: &[u8], code_off: usize) -> Option<u32> {
    let field = data.get(code_off + 12..code_off + 16)?;
    Some(LittleEndian::read_u32(field))
}

/// Parses the DEX header at `data[offset..]` and emits one [`Symbol`] per
/// method with a code item, named by its pretty-printed signature and
/// spanning `insns_size * 2` bytes starting at the code body.
pub fn parse_dex_symbols(
    data: &[u8],
    offset: u64,
    path: &std::path::Path,
    interner: &mut NameInterner,
) -> Result<Vec<Symbol>> {
    let file_size = data.len() as u64;
    let region = data
        .get(offset as usize..)
        .ok_or_else(|| Error::InvalidDexHeader(offset, path.to_path_buf()))?;
    let header =
        parse_header(region).ok_or_else(|| Error::InvalidDexHeader(offset, path.to_path_buf()))?;
    if offset + header.file_size as u64 > file_size {
        return Err(Error::InvalidDexHeader(offset, path.to_path_buf()));
    }

    let mut symbols = Vec::new();
    for class_idx in 0..header.class_defs_size {
        let entry_off = header.class_defs_off as usize + class_idx as usize * 32;
        let Some(entry) = region.get(entry_off..entry_off + 32) else {
            continue;
        };
        let class_data_off = LittleEndian::read_u32(&entry[24..28]);
        let Some(methods) = class_data_methods(region, class_data_off) else {
            continue;
        };
        for method in methods {
            if method.code_off == 0 {
                continue;
            }
            let Some(insns_size) = code_item_insns_size(region, method.code_off as usize) else {
                continue;
            };
            let Some(name) = method_pretty_name(region, &header, method.method_idx) else {
                continue;
            };
            let code_bytes_begin = offset + method.code_off as u64 + 16;
            let interned: Rc<str> = interner.intern(&name);
            symbols.push(Symbol::new(code_bytes_begin, insns_size as u64 * 2, interned));
        }
    }
    Ok(symbols)
}
