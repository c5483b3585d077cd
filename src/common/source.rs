/// A byte-offset span in source code.
///
/// Spans always refer to the spelling of a token: the file and byte range
/// where its text is physically written, never where an expansion placed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32,
    pub file_id: u32,
}

/// Sentinel file id for invalid locations (e.g. a macro without a stored
/// definition, or a location that was never set).
pub const INVALID_FILE_ID: u32 = u32::MAX;

impl Span {
    pub fn new(start: u32, end: u32, file_id: u32) -> Self {
        Self { start, end, file_id }
    }

    /// An invalid span. `is_valid()` is false for it and for nothing else.
    pub fn invalid() -> Self {
        Self { start: 0, end: 0, file_id: INVALID_FILE_ID }
    }

    pub fn is_valid(self) -> bool {
        self.file_id != INVALID_FILE_ID
    }

    /// Merge two spans in the same file into one covering both.
    /// Merging across files keeps `self` (callers only merge siblings).
    pub fn merge(self, other: Span) -> Span {
        if self.file_id != other.file_id {
            return self;
        }
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            file_id: self.file_id,
        }
    }
}

/// A human-readable source location.
#[derive(Debug, Clone)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug)]
struct SourceFile {
    name: String,
    /// Resolved filesystem path. None for virtual test files registered
    /// without one.
    real_path: Option<String>,
    /// Pseudo-files (`<builtin>`, `<command line>`) have no file entry at
    /// all; locations in them render as "File without FileEntry".
    has_entry: bool,
    content: String,
    line_offsets: Vec<u32>,
    /// Where this file was entered from: (parent file id, byte offset of the
    /// `#` of the include directive in the parent). None for the main file
    /// and for pseudo-files.
    include_origin: Option<(u32, u32)>,
}

/// Manages source files and provides span-to-location resolution.
///
/// Files are registered as the preprocessor enters them; include origins
/// record the `#include` site so that locations in different files can be
/// put into a single translation-unit order (`is_before_in_tu`).
#[derive(Debug, Default)]
pub struct SourceManager {
    files: Vec<SourceFile>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Register a real file with a resolved path.
    pub fn add_file(&mut self, name: String, real_path: Option<String>, content: String) -> u32 {
        let line_offsets = compute_line_offsets(&content);
        let id = self.files.len() as u32;
        self.files.push(SourceFile {
            name,
            real_path,
            has_entry: true,
            content,
            line_offsets,
            include_origin: None,
        });
        id
    }

    /// Register a pseudo-file such as `<builtin>` or `<command line>`.
    /// Locations in pseudo-files never render as valid full source locations.
    pub fn add_pseudo_file(&mut self, name: &str, content: String) -> u32 {
        let line_offsets = compute_line_offsets(&content);
        let id = self.files.len() as u32;
        self.files.push(SourceFile {
            name: name.to_string(),
            real_path: None,
            has_entry: false,
            content,
            line_offsets,
            include_origin: None,
        });
        id
    }

    /// Record that `file_id` was entered from an include directive whose `#`
    /// sits at `parent_offset` in `parent_id`.
    pub fn set_include_origin(&mut self, file_id: u32, parent_id: u32, parent_offset: u32) {
        if let Some(f) = self.files.get_mut(file_id as usize) {
            f.include_origin = Some((parent_id, parent_offset));
        }
    }

    pub fn num_files(&self) -> usize {
        self.files.len()
    }

    pub fn get_content(&self, file_id: u32) -> &str {
        &self.files[file_id as usize].content
    }

    pub fn get_filename(&self, file_id: u32) -> &str {
        &self.files[file_id as usize].name
    }

    pub fn real_path(&self, file_id: u32) -> Option<&str> {
        self.files.get(file_id as usize).and_then(|f| f.real_path.as_deref())
    }

    /// The spelled text of a span.
    pub fn span_text(&self, span: Span) -> &str {
        if !span.is_valid() {
            return "";
        }
        let content = &self.files[span.file_id as usize].content;
        let start = (span.start as usize).min(content.len());
        let end = (span.end as usize).min(content.len());
        &content[start..end]
    }

    /// Resolve a span to a human-readable source location (1-based line/col).
    pub fn resolve_span(&self, span: Span) -> SourceLocation {
        if !span.is_valid() || (span.file_id as usize) >= self.files.len() {
            return SourceLocation { file: "<unknown>".to_string(), line: 0, column: 0 };
        }
        let file = &self.files[span.file_id as usize];
        let line = match file.line_offsets.binary_search(&span.start) {
            Ok(i) => i as u32,
            Err(i) => (i - 1) as u32,
        };
        let col = span.start - file.line_offsets[line as usize];
        SourceLocation {
            file: file.name.clone(),
            line: line + 1,
            column: col + 1,
        }
    }

    /// Tries to get the full real path and line + column for a location.
    ///
    /// Ok is `realpath:line:col`. Err carries the reason the location could
    /// not be rendered; the strings are part of the report format.
    pub fn try_get_full_source_loc(&self, loc: Span) -> Result<String, &'static str> {
        if !loc.is_valid() {
            return Err("Invalid SLoc");
        }
        let Some(file) = self.files.get(loc.file_id as usize) else {
            return Err("Invalid file ID");
        };
        if !file.has_entry {
            return Err("File without FileEntry");
        }
        let Some(real_path) = file.real_path.as_deref().filter(|p| !p.is_empty()) else {
            return Err("Nameless file");
        };
        if (loc.start as usize) > file.content.len() {
            return Err("Invalid File SLoc");
        }
        let resolved = self.resolve_span(loc);
        Ok(format!("{}:{}:{}", real_path, resolved.line, resolved.column))
    }

    /// Translation-unit order: true iff `a` comes strictly before `b` in the
    /// token order of the preprocessed translation unit.
    ///
    /// Locations in different files are compared by decomposing each through
    /// its include chain down to the common ancestor file, then comparing
    /// offsets there. The include point itself precedes the included content.
    /// Never compare raw offsets across files without going through this.
    pub fn is_before_in_tu(&self, a: Span, b: Span) -> bool {
        if !a.is_valid() || !b.is_valid() {
            return false;
        }
        if a.file_id == b.file_id {
            return a.start < b.start;
        }
        let pa = self.tu_path(a);
        let pb = self.tu_path(b);
        for (ea, eb) in pa.iter().zip(pb.iter()) {
            if ea.0 != eb.0 {
                // Unrelated chain roots. Pseudo-files (`<builtin>`,
                // `<command line>`) precede every real file, mirroring the
                // predefines buffer; otherwise registration order decides.
                let a_pseudo = self.files.get(ea.0 as usize).is_some_and(|f| !f.has_entry);
                let b_pseudo = self.files.get(eb.0 as usize).is_some_and(|f| !f.has_entry);
                return match (a_pseudo, b_pseudo) {
                    (true, false) => true,
                    (false, true) => false,
                    _ => ea.0 < eb.0,
                };
            }
            if ea.1 != eb.1 {
                return ea.1 < eb.1;
            }
        }
        // Equal prefix: the shorter path sits at the include directive that
        // produced the deeper one, and the directive precedes the content.
        pa.len() < pb.len()
    }

    /// The include-chain decomposition of a location, root file first:
    /// [(root, offset of include), ..., (loc.file_id, loc.start)].
    fn tu_path(&self, loc: Span) -> Vec<(u32, u32)> {
        let mut path = vec![(loc.file_id, loc.start)];
        let mut cur = loc.file_id;
        while let Some(file) = self.files.get(cur as usize) {
            match file.include_origin {
                Some((parent, offset)) => {
                    path.push((parent, offset));
                    cur = parent;
                }
                None => break,
            }
        }
        path.reverse();
        path
    }
}

fn compute_line_offsets(content: &str) -> Vec<u32> {
    let bytes = content.as_bytes();
    let mut offsets = Vec::with_capacity(bytes.len() / 40 + 1);
    offsets.push(0u32);
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            offsets.push((i + 1) as u32);
        }
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_line_and_column() {
        let mut sm = SourceManager::new();
        let f = sm.add_file("a.c".into(), Some("/tmp/a.c".into()), "int x;\nint y;\n".into());
        let loc = sm.resolve_span(Span::new(7, 10, f));
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 1);
    }

    #[test]
    fn full_source_loc_errors() {
        let mut sm = SourceManager::new();
        let real = sm.add_file("a.c".into(), Some("/tmp/a.c".into()), "int x;".into());
        let nameless = sm.add_file("mem.c".into(), None, "int y;".into());
        let pseudo = sm.add_pseudo_file("<builtin>", "#define __LINE__".into());

        assert_eq!(
            sm.try_get_full_source_loc(Span::new(0, 3, real)).unwrap(),
            "/tmp/a.c:1:1"
        );
        assert_eq!(sm.try_get_full_source_loc(Span::invalid()), Err("Invalid SLoc"));
        assert_eq!(sm.try_get_full_source_loc(Span::new(0, 0, 99)), Err("Invalid file ID"));
        assert_eq!(
            sm.try_get_full_source_loc(Span::new(0, 0, pseudo)),
            Err("File without FileEntry")
        );
        assert_eq!(sm.try_get_full_source_loc(Span::new(0, 0, nameless)), Err("Nameless file"));
        assert_eq!(
            sm.try_get_full_source_loc(Span::new(500, 501, real)),
            Err("Invalid File SLoc")
        );
    }

    #[test]
    fn tu_order_across_includes() {
        let mut sm = SourceManager::new();
        let main = sm.add_file("main.c".into(), Some("/tmp/main.c".into()),
            "#include \"a.h\"\nint x;\n".into());
        let hdr = sm.add_file("a.h".into(), Some("/tmp/a.h".into()), "int h;\n".into());
        sm.set_include_origin(hdr, main, 0);

        let in_hdr = Span::new(4, 5, hdr);
        let before_inc = Span::new(0, 1, main);
        let after_inc = Span::new(16, 17, main);

        assert!(sm.is_before_in_tu(before_inc, in_hdr));
        assert!(sm.is_before_in_tu(in_hdr, after_inc));
        assert!(!sm.is_before_in_tu(after_inc, in_hdr));
        assert!(!sm.is_before_in_tu(in_hdr, in_hdr));
    }
}
