//! Hand-built minimal ELF64/little-endian fixtures for the scenario tests
//! in §8. There is no synthetic-ELF crate in this engine's dependency
//! stack, so fixtures are assembled byte-by-byte rather than pulled from
//! an `object`-writer API.

pub struct TestSymbol {
    pub name: &'static str,
    pub addr: u64,
    pub size: u64,
    pub is_func: bool,
}

fn pad4(mut v: Vec<u8>) -> Vec<u8> {
    while v.len() % 4 != 0 {
        v.push(0);
    }
    v
}

/// Builds a minimal ET_DYN x86-64 ELF with:
/// - an optional `NT_GNU_BUILD_ID` note (exposed via a `.note.gnu.build-id`
///   section and a matching `PT_NOTE` program header),
/// - an optional executable `PT_LOAD` segment at `exec_load_vaddr`,
/// - an optional `.symtab`/`.strtab` pair describing `symbols`, all placed
///   in a single `.text` section so each symbol's `is_in_text_section`
///   check is satisfied.
pub fn build_elf(
    build_id: Option<&[u8]>,
    exec_load_vaddr: Option<u64>,
    symbols: &[TestSymbol],
) -> Vec<u8> {
    let mut phdrs: Vec<[u8; 56]> = Vec::new();

    // --- note payload ---
    let note_bytes = build_id.map(|id| {
        let mut note = Vec::new();
        let name = b"GNU\0";
        note.extend_from_slice(&(name.len() as u32).to_le_bytes()); // namesz
        note.extend_from_slice(&(id.len() as u32).to_le_bytes()); // descsz
        note.extend_from_slice(&3u32.to_le_bytes()); // NT_GNU_BUILD_ID
        note.extend_from_slice(name);
        note.extend_from_slice(id);
        pad4(note)
    });

    // --- layout bookkeeping ---
    let ehdr_size = 64usize;
    let phdr_size = 56usize;
    let num_phdrs = (build_id.is_some() as usize) + (exec_load_vaddr.is_some() as usize);
    let phdr_table_off = ehdr_size;
    let mut cursor = phdr_table_off + num_phdrs * phdr_size;

    let note_off = note_bytes.as_ref().map(|_| {
        let off = cursor;
        cursor += note_bytes.as_ref().unwrap().len();
        off
    });

    let text_off = cursor;
    // .text carries no real instructions; only the symbol table references
    // addresses inside it.
    let text_size = 0x1000u64;
    cursor += 0; // text section has no file-backed bytes for this fixture

    let have_symtab = !symbols.is_empty();
    let (symtab_off, symtab_size, strtab_off, strtab_bytes) = if have_symtab {
        let mut strtab = vec![0u8]; // index 0 == empty name
        let mut name_offsets = Vec::new();
        for sym in symbols {
            name_offsets.push(strtab.len() as u32);
            strtab.extend_from_slice(sym.name.as_bytes());
            strtab.push(0);
        }

        let mut symtab = Vec::new();
        // null symbol
        symtab.extend_from_slice(&[0u8; 24]);
        for (sym, name_off) in symbols.iter().zip(name_offsets.iter()) {
            let stt = if sym.is_func { 2u8 } else { 0u8 }; // STT_FUNC / STT_NOTYPE
            let info = (1u8 << 4) | stt; // STB_GLOBAL
            symtab.extend_from_slice(&name_off.to_le_bytes());
            symtab.push(info);
            symtab.push(0); // st_other
            symtab.extend_from_slice(&1u16.to_le_bytes()); // st_shndx = .text (section 1)
            symtab.extend_from_slice(&sym.addr.to_le_bytes());
            symtab.extend_from_slice(&sym.size.to_le_bytes());
        }

        let symtab_off = cursor;
        cursor += symtab.len();
        let strtab_off = cursor;
        cursor += strtab.len();
        (Some(symtab_off), symtab.len(), Some(strtab_off), Some((strtab, symtab)))
    } else {
        (None, 0, None, None)
    };

    // --- section header string table ---
    let mut shstrtab = vec![0u8];
    let text_name_off = shstrtab.len() as u32;
    shstrtab.extend_from_slice(b".text\0");
    let note_name_off = if build_id.is_some() {
        let off = shstrtab.len() as u32;
        shstrtab.extend_from_slice(b".note.gnu.build-id\0");
        Some(off)
    } else {
        None
    };
    let symtab_name_off = if have_symtab {
        let off = shstrtab.len() as u32;
        shstrtab.extend_from_slice(b".symtab\0");
        Some(off)
    } else {
        None
    };
    let strtab_name_off = if have_symtab {
        let off = shstrtab.len() as u32;
        shstrtab.extend_from_slice(b".strtab\0");
        Some(off)
    } else {
        None
    };
    let shstrtab_name_off = shstrtab.len() as u32;
    shstrtab.extend_from_slice(b".shstrtab\0");

    let shstrtab_off = cursor;
    cursor += shstrtab.len();
    let _ = cursor;

    // --- section headers ---
    let mut shdrs: Vec<Vec<u8>> = Vec::new();
    shdrs.push(vec![0u8; 64]); // NULL section

    let mut text_shdr = Vec::with_capacity(64);
    text_shdr.extend_from_slice(&text_name_off.to_le_bytes());
    text_shdr.extend_from_slice(&1u32.to_le_bytes()); // SHT_PROGBITS
    text_shdr.extend_from_slice(&0x6u64.to_le_bytes()); // SHF_ALLOC | SHF_EXECINSTR
    text_shdr.extend_from_slice(&exec_load_vaddr.unwrap_or(0).to_le_bytes());
    text_shdr.extend_from_slice(&(text_off as u64).to_le_bytes());
    text_shdr.extend_from_slice(&text_size.to_le_bytes());
    text_shdr.extend_from_slice(&0u32.to_le_bytes());
    text_shdr.extend_from_slice(&0u32.to_le_bytes());
    text_shdr.extend_from_slice(&1u64.to_le_bytes());
    text_shdr.extend_from_slice(&0u64.to_le_bytes());
    let text_section_index = shdrs.len() as u32;
    shdrs.push(text_shdr);

    if let (Some(note_off), Some(note_bytes)) = (note_off, &note_bytes) {
        let mut note_shdr = Vec::with_capacity(64);
        note_shdr.extend_from_slice(&note_name_off.unwrap().to_le_bytes());
        note_shdr.extend_from_slice(&7u32.to_le_bytes()); // SHT_NOTE
        note_shdr.extend_from_slice(&2u64.to_le_bytes()); // SHF_ALLOC
        note_shdr.extend_from_slice(&0u64.to_le_bytes());
        note_shdr.extend_from_slice(&(note_off as u64).to_le_bytes());
        note_shdr.extend_from_slice(&(note_bytes.len() as u64).to_le_bytes());
        note_shdr.extend_from_slice(&0u32.to_le_bytes());
        note_shdr.extend_from_slice(&0u32.to_le_bytes());
        note_shdr.extend_from_slice(&4u64.to_le_bytes());
        note_shdr.extend_from_slice(&0u64.to_le_bytes());
        shdrs.push(note_shdr);
    }

    let mut strtab_section_index = 0u32;
    if have_symtab {
        strtab_section_index = text_section_index + if build_id.is_some() { 3 } else { 2 };
    }

    if let Some(symtab_off) = symtab_off {
        let mut symtab_shdr = Vec::with_capacity(64);
        symtab_shdr.extend_from_slice(&symtab_name_off.unwrap().to_le_bytes());
        symtab_shdr.extend_from_slice(&2u32.to_le_bytes()); // SHT_SYMTAB
        symtab_shdr.extend_from_slice(&0u64.to_le_bytes());
        symtab_shdr.extend_from_slice(&0u64.to_le_bytes());
        symtab_shdr.extend_from_slice(&(symtab_off as u64).to_le_bytes());
        symtab_shdr.extend_from_slice(&(symtab_size as u64).to_le_bytes());
        symtab_shdr.extend_from_slice(&strtab_section_index.to_le_bytes()); // sh_link -> strtab
        symtab_shdr.extend_from_slice(&1u32.to_le_bytes()); // sh_info: one local (null) symbol
        symtab_shdr.extend_from_slice(&8u64.to_le_bytes());
        symtab_shdr.extend_from_slice(&24u64.to_le_bytes());
        shdrs.push(symtab_shdr);
    }

    if let (Some(strtab_off), Some((strtab_bytes, _))) = (strtab_off, &strtab_bytes) {
        let mut strtab_shdr = Vec::with_capacity(64);
        strtab_shdr.extend_from_slice(&strtab_name_off.unwrap().to_le_bytes());
        strtab_shdr.extend_from_slice(&3u32.to_le_bytes()); // SHT_STRTAB
        strtab_shdr.extend_from_slice(&0u64.to_le_bytes());
        strtab_shdr.extend_from_slice(&0u64.to_le_bytes());
        strtab_shdr.extend_from_slice(&(strtab_off as u64).to_le_bytes());
        strtab_shdr.extend_from_slice(&(strtab_bytes.len() as u64).to_le_bytes());
        strtab_shdr.extend_from_slice(&0u32.to_le_bytes());
        strtab_shdr.extend_from_slice(&0u32.to_le_bytes());
        strtab_shdr.extend_from_slice(&1u64.to_le_bytes());
        strtab_shdr.extend_from_slice(&0u64.to_le_bytes());
        shdrs.push(strtab_shdr);
    }

    let shstrtab_section_index = shdrs.len() as u32;
    let mut shstrtab_shdr = Vec::with_capacity(64);
    shstrtab_shdr.extend_from_slice(&shstrtab_name_off.to_le_bytes());
    shstrtab_shdr.extend_from_slice(&3u32.to_le_bytes()); // SHT_STRTAB
    shstrtab_shdr.extend_from_slice(&0u64.to_le_bytes());
    shstrtab_shdr.extend_from_slice(&0u64.to_le_bytes());
    shstrtab_shdr.extend_from_slice(&(shstrtab_off as u64).to_le_bytes());
    shstrtab_shdr.extend_from_slice(&(shstrtab.len() as u64).to_le_bytes());
    shstrtab_shdr.extend_from_slice(&0u32.to_le_bytes());
    shstrtab_shdr.extend_from_slice(&0u32.to_le_bytes());
    shstrtab_shdr.extend_from_slice(&1u64.to_le_bytes());
    shstrtab_shdr.extend_from_slice(&0u64.to_le_bytes());
    shdrs.push(shstrtab_shdr);

    let shdr_table_off = shstrtab_off + shstrtab.len();

    // --- program headers ---
    if let (Some(note_off), Some(note_bytes)) = (note_off, &note_bytes) {
        let mut phdr = [0u8; 56];
        phdr[0..4].copy_from_slice(&4u32.to_le_bytes()); // PT_NOTE
        phdr[4..8].copy_from_slice(&4u32.to_le_bytes()); // PF_R
        phdr[8..16].copy_from_slice(&(note_off as u64).to_le_bytes());
        phdr[16..24].copy_from_slice(&0u64.to_le_bytes());
        phdr[24..32].copy_from_slice(&0u64.to_le_bytes());
        phdr[32..40].copy_from_slice(&(note_bytes.len() as u64).to_le_bytes());
        phdr[40..48].copy_from_slice(&(note_bytes.len() as u64).to_le_bytes());
        phdr[48..56].copy_from_slice(&4u64.to_le_bytes());
        phdrs.push(phdr);
    }
    if let Some(vaddr) = exec_load_vaddr {
        let mut phdr = [0u8; 56];
        phdr[0..4].copy_from_slice(&1u32.to_le_bytes()); // PT_LOAD
        phdr[4..8].copy_from_slice(&5u32.to_le_bytes()); // PF_R | PF_X
        phdr[8..16].copy_from_slice(&(text_off as u64).to_le_bytes());
        phdr[16..24].copy_from_slice(&vaddr.to_le_bytes());
        phdr[24..32].copy_from_slice(&vaddr.to_le_bytes());
        phdr[32..40].copy_from_slice(&text_size.to_le_bytes());
        phdr[40..48].copy_from_slice(&text_size.to_le_bytes());
        phdr[48..56].copy_from_slice(&0x1000u64.to_le_bytes());
        phdrs.push(phdr);
    }

    // --- ELF header ---
    let mut out = Vec::new();
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
    out.push(2); // ELFCLASS64
    out.push(1); // ELFDATA2LSB
    out.push(1); // EI_VERSION
    out.push(0); // EI_OSABI
    out.extend_from_slice(&[0u8; 8]); // padding
    out.extend_from_slice(&3u16.to_le_bytes()); // e_type = ET_DYN
    out.extend_from_slice(&0x3Eu16.to_le_bytes()); // e_machine = EM_X86_64
    out.extend_from_slice(&1u32.to_le_bytes()); // e_version
    out.extend_from_slice(&0u64.to_le_bytes()); // e_entry
    out.extend_from_slice(&(phdr_table_off as u64).to_le_bytes()); // e_phoff
    out.extend_from_slice(&(shdr_table_off as u64).to_le_bytes()); // e_shoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&(ehdr_size as u16).to_le_bytes()); // e_ehsize
    out.extend_from_slice(&(phdr_size as u16).to_le_bytes()); // e_phentsize
    out.extend_from_slice(&(num_phdrs as u16).to_le_bytes()); // e_phnum
    out.extend_from_slice(&64u16.to_le_bytes()); // e_shentsize
    out.extend_from_slice(&(shdrs.len() as u16).to_le_bytes()); // e_shnum
    out.extend_from_slice(&(shstrtab_section_index as u16).to_le_bytes()); // e_shstrndx
    assert_eq!(out.len(), ehdr_size);

    for phdr in &phdrs {
        out.extend_from_slice(phdr);
    }
    assert_eq!(out.len(), phdr_table_off + num_phdrs * phdr_size);

    if let Some(note_bytes) = &note_bytes {
        out.extend_from_slice(note_bytes);
    }
    assert_eq!(out.len(), text_off);

    if let Some((strtab_bytes, symtab_bytes)) = &strtab_bytes {
        out.extend_from_slice(symtab_bytes);
        out.extend_from_slice(strtab_bytes);
    }

    out.extend_from_slice(&shstrtab);
    assert_eq!(out.len(), shdr_table_off);

    for shdr in &shdrs {
        out.extend_from_slice(shdr);
    }

    out
}

fn uleb128(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
    out
}

fn mutf8_string_data(s: &str) -> Vec<u8> {
    let mut out = uleb128(s.encode_utf16().count() as u64);
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    out
}

/// Builds a minimal single-class, single-method DEX file whose one method
/// has `class_descriptor`/`method_name`/`param_descriptors` and a code item
/// of `insns_size_code_units` code units (2 bytes each). Good enough to
/// exercise [`dex::parse_dex_symbols`]'s class/method/parameter-table
/// walk end to end; return-type and access-flag bytes are left at zero
/// since nothing in that walk reads them.
pub fn build_dex(
    class_descriptor: &str,
    method_name: &str,
    param_descriptors: &[&str],
    insns_size_code_units: u32,
) -> Vec<u8> {
    const HEADER_SIZE: usize = 0x70;

    // string_ids: [class_descriptor, method_name, param_0, param_1, ...]
    let mut strings: Vec<&str> = vec![class_descriptor, method_name];
    strings.extend_from_slice(param_descriptors);
    let num_strings = strings.len() as u32;

    // type_ids: [class_descriptor, param_0, param_1, ...] (string indices 0, 2, 3, ...)
    let num_types = 1 + param_descriptors.len() as u32;
    let type_string_indices: Vec<u32> = std::iter::once(0u32)
        .chain((0..param_descriptors.len() as u32).map(|i| i + 2))
        .collect();

    let mut pos = HEADER_SIZE;
    let string_ids_off = pos;
    pos += num_strings as usize * 4;
    let type_ids_off = pos;
    pos += num_types as usize * 4;
    let proto_ids_off = pos;
    pos += 12; // one proto
    let method_ids_off = pos;
    pos += 8; // one method
    let class_defs_off = pos;
    pos += 32; // one class

    let mut string_data_bytes: Vec<Vec<u8>> = Vec::new();
    let mut string_data_offs: Vec<u32> = Vec::new();
    for s in &strings {
        string_data_offs.push(pos as u32);
        let bytes = mutf8_string_data(s);
        pos += bytes.len();
        string_data_bytes.push(bytes);
    }

    let parameters_off = if param_descriptors.is_empty() {
        0u32
    } else {
        let off = pos as u32;
        pos += 4 + param_descriptors.len() * 2;
        off
    };

    let code_off = pos as u32;
    pos += 16 + insns_size_code_units as usize * 2;

    let class_data_bytes = {
        let mut b = Vec::new();
        b.extend(uleb128(0)); // static_fields_size
        b.extend(uleb128(0)); // instance_fields_size
        b.extend(uleb128(1)); // direct_methods_size
        b.extend(uleb128(0)); // virtual_methods_size
        b.extend(uleb128(0)); // method_idx diff (method 0)
        b.extend(uleb128(0)); // access_flags
        b.extend(uleb128(code_off as u64)); // code_off
        b
    };
    let class_data_off = pos as u32;
    pos += class_data_bytes.len();

    let file_size = pos as u32;

    let mut out = vec![0u8; HEADER_SIZE];
    out[0..4].copy_from_slice(b"dex\n");
    out[7] = 0x00;
    out[32..36].copy_from_slice(&file_size.to_le_bytes());
    out[40..44].copy_from_slice(&0x12345678u32.to_le_bytes());
    out[56..60].copy_from_slice(&num_strings.to_le_bytes());
    out[60..64].copy_from_slice(&(string_ids_off as u32).to_le_bytes());
    out[64..68].copy_from_slice(&num_types.to_le_bytes());
    out[68..72].copy_from_slice(&(type_ids_off as u32).to_le_bytes());
    out[72..76].copy_from_slice(&1u32.to_le_bytes());
    out[76..80].copy_from_slice(&(proto_ids_off as u32).to_le_bytes());
    out[88..92].copy_from_slice(&1u32.to_le_bytes());
    out[92..96].copy_from_slice(&(method_ids_off as u32).to_le_bytes());
    out[96..100].copy_from_slice(&1u32.to_le_bytes());
    out[100..104].copy_from_slice(&(class_defs_off as u32).to_le_bytes());
    assert_eq!(out.len(), HEADER_SIZE);

    for off in &string_data_offs {
        out.extend_from_slice(&off.to_le_bytes());
    }
    assert_eq!(out.len(), type_ids_off);

    for idx in &type_string_indices {
        out.extend_from_slice(&idx.to_le_bytes());
    }
    assert_eq!(out.len(), proto_ids_off);

    out.extend_from_slice(&0u32.to_le_bytes()); // shorty_idx (unused)
    out.extend_from_slice(&0u32.to_le_bytes()); // return_type_idx (unused)
    out.extend_from_slice(&parameters_off.to_le_bytes());
    assert_eq!(out.len(), method_ids_off);

    out.extend_from_slice(&0u16.to_le_bytes()); // class_idx
    out.extend_from_slice(&0u16.to_le_bytes()); // proto_idx
    out.extend_from_slice(&1u32.to_le_bytes()); // name_idx (method name string)
    assert_eq!(out.len(), class_defs_off);

    out.extend_from_slice(&[0u8; 24]);
    out.extend_from_slice(&class_data_off.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    assert_eq!(out.len(), class_defs_off + 32);
    assert_eq!(out.len(), string_data_offs[0] as usize);

    for bytes in &string_data_bytes {
        out.extend_from_slice(bytes);
    }

    if !param_descriptors.is_empty() {
        assert_eq!(out.len(), parameters_off as usize);
        out.extend_from_slice(&(param_descriptors.len() as u32).to_le_bytes());
        for idx in &type_string_indices[1..] {
            out.extend_from_slice(&(*idx as u16).to_le_bytes());
        }
    }

    assert_eq!(out.len(), code_off as usize);
    out.extend_from_slice(&[0u8; 12]); // registers/ins/outs/tries/debug_info_off
    out.extend_from_slice(&insns_size_code_units.to_le_bytes());
    out.extend_from_slice(&vec![0u8; insns_size_code_units as usize * 2]);

    assert_eq!(out.len(), class_data_off as usize);
    out.extend_from_slice(&class_data_bytes);

    assert_eq!(out.len(), file_size as usize);
    out
}
