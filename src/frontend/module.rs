//! Module System for Snake
//!
//! Discovers every file reachable through `import "..."`, parses each once,
//! rejects import cycles and splices the imported items into one program.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Deserialize;

use crate::frontend::ast::{HostModule, Import, Item, Program};
use crate::frontend::parser::parse_source;
use crate::utils::{Error, Result, Span};

/// Entry file of a library directory
const LIBRARY_ENTRY: &str = "__main__.sk";
/// Optional metadata next to a library entry
const LIBRARY_METADATA: &str = "snake_metadata.json";

/// `snake_metadata.json`
#[derive(Debug, Default, Deserialize)]
struct LibraryMetadata {
    #[serde(default)]
    python_dependencies: Vec<String>,
}

/// An import statement resolved to a file of the arena
#[derive(Debug, Clone, Copy)]
struct ResolvedImport {
    /// Index of the import item in the importing file
    item_index: usize,
    /// Arena index of the imported file
    target: usize,
    span: Span,
}

/// A parsed file in the arena
#[derive(Debug, Clone)]
pub struct ParsedModule {
    /// Canonical path of the file
    pub path: PathBuf,
    /// Top-level items, taken when the program is merged
    pub items: Vec<Item>,
    /// Host modules contributed by library metadata
    pub metadata_imports: Vec<HostModule>,
    imports: Vec<ResolvedImport>,
}

/// Where an import literal was found
struct Located {
    path: PathBuf,
    /// Library directory, when the literal named a library
    library: Option<PathBuf>,
}

/// Module resolver for whole-program compilation
pub struct ModuleResolver {
    /// Library roots searched after the importing file's directory
    search_roots: Vec<PathBuf>,
    /// Arena of parsed files, indexed by file id
    modules: Vec<ParsedModule>,
    /// Canonical path to file id
    index: HashMap<PathBuf, usize>,
}

impl ModuleResolver {
    /// Create a resolver searching the given library roots
    pub fn new(search_roots: Vec<PathBuf>) -> Self {
        Self {
            search_roots,
            modules: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Paths of every file parsed so far, indexed by file id. Also valid
    /// after a failed resolution, for rendering the error.
    pub fn files(&self) -> Vec<PathBuf> {
        self.modules.iter().map(|m| m.path.clone()).collect()
    }

    /// Read, parse and resolve the program rooted at `entry`
    pub fn resolve(&mut self, entry: &Path) -> Result<Program> {
        let path = canonical(entry);
        let source = read_source(&path)?;
        self.push_module(path, &source)?;
        self.finish()
    }

    /// Resolve an already parsed entry program. `entry` may name a file that
    /// does not exist (in-memory source); its imports then resolve against
    /// the current directory.
    pub fn resolve_program(&mut self, program: Program, entry: &Path) -> Result<Program> {
        let path = canonical(entry);
        self.index.insert(path.clone(), self.modules.len());
        self.modules.push(ParsedModule {
            path,
            items: program.items,
            metadata_imports: Vec::new(),
            imports: Vec::new(),
        });
        self.finish()
    }

    fn finish(&mut self) -> Result<Program> {
        self.discover()?;
        self.detect_cycle()?;
        let files = self.files();
        let items = self.merge();
        info!("resolved {} file(s), {} items", files.len(), items.len());
        Ok(Program { items, files })
    }

    /// Parse `source` as the next file of the arena
    fn push_module(&mut self, path: PathBuf, source: &str) -> Result<usize> {
        let file_id = self.modules.len();
        self.index.insert(path.clone(), file_id);
        self.modules.push(ParsedModule {
            path,
            items: Vec::new(),
            metadata_imports: Vec::new(),
            imports: Vec::new(),
        });
        let program = parse_source(source, file_id)?;
        self.modules[file_id].items = program.items;
        Ok(file_id)
    }

    /// Work-list over the arena: resolve every local import, parsing newly
    /// found files exactly once.
    fn discover(&mut self) -> Result<()> {
        let mut queue = vec![0];

        while let Some(id) = queue.pop() {
            let base = self.modules[id]
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));

            let literals: Vec<(usize, String, Span)> = self.modules[id]
                .items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| match item {
                    Item::Import(Import::Local { path, span }) => Some((index, path.clone(), *span)),
                    _ => None,
                })
                .collect();

            for (item_index, literal, span) in literals {
                let located = self.locate(&literal, &base, span)?;
                let path = canonical(&located.path);

                let target = match self.index.get(&path) {
                    Some(&target) => target,
                    None => {
                        debug!("discovered {} (imported as \"{}\")", path.display(), literal);
                        let source = read_source(&path)?;
                        let target = self.push_module(path, &source)?;
                        if let Some(library) = &located.library {
                            self.modules[target].metadata_imports = read_metadata(library, span);
                        }
                        queue.push(target);
                        target
                    }
                };

                self.modules[id].imports.push(ResolvedImport { item_index, target, span });
            }
        }

        Ok(())
    }

    /// Find the file an import literal names: first next to the importing
    /// file, then under each library root.
    fn locate(&self, literal: &str, base: &Path, span: Span) -> Result<Located> {
        let mut dirs = vec![base.to_path_buf()];
        dirs.extend(self.search_roots.iter().cloned());

        for dir in &dirs {
            if literal.ends_with(".sk") {
                let path = dir.join(literal);
                if path.is_file() {
                    return Ok(Located { path, library: None });
                }
                continue;
            }

            let file = dir.join(format!("{}.sk", literal));
            if file.is_file() {
                return Ok(Located { path: file, library: None });
            }
            let library = dir.join(literal);
            let entry = library.join(LIBRARY_ENTRY);
            if entry.is_file() {
                return Ok(Located { path: entry, library: Some(library) });
            }
        }

        let searched: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
        Err(Error::ImportNotFound {
            path: literal.to_string(),
            searched: searched.join(", "),
            span,
        })
    }

    /// Iterative depth-first search over the import graph
    fn detect_cycle(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        if self.modules.is_empty() {
            return Ok(());
        }

        let mut marks = vec![Mark::New; self.modules.len()];
        // (file id, next import to follow)
        let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
        marks[0] = Mark::Active;

        while let Some(frame) = stack.last_mut() {
            let (id, next) = *frame;
            let Some(import) = self.modules[id].imports.get(next).copied() else {
                marks[id] = Mark::Done;
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match marks[import.target] {
                Mark::Active => {
                    let from = stack
                        .iter()
                        .position(|&(file, _)| file == import.target)
                        .unwrap_or(0);
                    let mut chain: Vec<String> = stack[from..]
                        .iter()
                        .map(|&(file, _)| self.display_name(file))
                        .collect();
                    chain.push(self.display_name(import.target));
                    return Err(Error::ImportCycle { chain: chain.join(" -> "), span: import.span });
                }
                Mark::New => {
                    marks[import.target] = Mark::Active;
                    stack.push((import.target, 0));
                }
                Mark::Done => {}
            }
        }

        Ok(())
    }

    fn display_name(&self, id: usize) -> String {
        self.modules[id].path.display().to_string()
    }

    /// Splice imported files in place of their first import. Later imports
    /// of the same file and repeated host imports are dropped.
    fn merge(&mut self) -> Vec<Item> {
        let mut out = Vec::new();
        let mut expanded = vec![false; self.modules.len()];
        let mut hosts: HashSet<(String, String, Option<String>)> = HashSet::new();

        expanded[0] = true;
        let entry_items = std::mem::take(&mut self.modules[0].items);
        let mut stack = vec![(0usize, entry_items.into_iter().enumerate())];

        while let Some((id, items)) = stack.last_mut() {
            let id = *id;
            let Some((index, item)) = items.next() else {
                stack.pop();
                continue;
            };

            match item {
                Item::Import(Import::Local { .. }) => {
                    let target = self.modules[id]
                        .imports
                        .iter()
                        .find(|import| import.item_index == index)
                        .map(|import| import.target);
                    if let Some(target) = target {
                        if !expanded[target] {
                            expanded[target] = true;
                            let metadata = std::mem::take(&mut self.modules[target].metadata_imports);
                            if !metadata.is_empty() {
                                let span = metadata[0].span;
                                push_host_import(&mut out, &mut hosts, "python".to_string(), metadata, span);
                            }
                            let items = std::mem::take(&mut self.modules[target].items);
                            stack.push((target, items.into_iter().enumerate()));
                        }
                    }
                }
                Item::Import(Import::Host { ecosystem, modules, span }) => {
                    push_host_import(&mut out, &mut hosts, ecosystem, modules, span);
                }
                other => out.push(other),
            }
        }

        out
    }
}

/// Emit a host import keeping only modules not imported before
fn push_host_import(
    out: &mut Vec<Item>,
    seen: &mut HashSet<(String, String, Option<String>)>,
    ecosystem: String,
    modules: Vec<HostModule>,
    span: Span,
) {
    let modules: Vec<HostModule> = modules
        .into_iter()
        .filter(|m| seen.insert((ecosystem.clone(), m.name.clone(), m.alias.clone())))
        .collect();
    if !modules.is_empty() {
        out.push(Item::Import(Import::Host { ecosystem, modules, span }));
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Host imports declared by a library's metadata; malformed metadata is
/// reported and ignored
fn read_metadata(library: &Path, span: Span) -> Vec<HostModule> {
    let path = library.join(LIBRARY_METADATA);
    if !path.is_file() {
        return Vec::new();
    }

    let metadata = fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<LibraryMetadata>(&text).map_err(|e| e.to_string()));

    match metadata {
        Ok(metadata) => metadata
            .python_dependencies
            .into_iter()
            .map(|name| HostModule { name, alias: None, span })
            .collect(),
        Err(e) => {
            warn!("ignoring malformed library metadata {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Resolve the program rooted at `entry`
pub fn resolve(entry: &Path, search_roots: &[PathBuf]) -> Result<Program> {
    ModuleResolver::new(search_roots.to_vec()).resolve(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::Stmt;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        path
    }

    fn const_names(program: &Program) -> Vec<String> {
        program
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Const(c) => Some(c.name.name.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_transitive_import_contributes_once() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.sk", "const A: int = 1;\n");
        write(dir.path(), "b.sk", "import \"a.sk\";\nconst B: int = A + 1;\n");
        let main = write(
            dir.path(),
            "main.sk",
            "import \"b.sk\";\nimport \"a.sk\";\nconst C: int = B;\n",
        );

        let program = resolve(&main, &[]).unwrap();
        assert_eq!(const_names(&program), vec!["A", "B", "C"]);
        assert_eq!(program.files.len(), 3);
        assert!(program.items.iter().all(|i| !matches!(i, Item::Import(Import::Local { .. }))));
    }

    #[test]
    fn test_file_ids_index_the_file_table() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "shapes.sk", "struct Point { x: int; y: int }\n");
        let main = write(dir.path(), "main.sk", "import \"shapes.sk\";\nx: int = 1;\n");

        let program = resolve(&main, &[]).unwrap();
        let Item::Struct(point) = &program.items[0] else { panic!("expected struct") };
        let file = program.file_path(point.span.file_id).unwrap();
        assert!(file.ends_with("shapes.sk"));
        let Item::Stmt(Stmt::VarDecl(x)) = &program.items[1] else { panic!("expected declaration") };
        assert!(program.file_path(x.span.file_id).unwrap().ends_with("main.sk"));
    }

    #[test]
    fn test_import_cycle() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.sk", "import \"b.sk\";\n");
        write(dir.path(), "b.sk", "import \"a.sk\";\n");
        let main = write(dir.path(), "main.sk", "import \"a.sk\";\n");

        let err = resolve(&main, &[]).unwrap_err();
        assert_eq!(err.kind(), "ImportCycle");
        let message = err.to_string();
        assert!(message.contains("a.sk") && message.contains("b.sk"), "{}", message);
    }

    #[test]
    fn test_self_import_is_cycle() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "main.sk", "import \"main.sk\";\n");
        assert_eq!(resolve(&main, &[]).unwrap_err().kind(), "ImportCycle");
    }

    #[test]
    fn test_not_found_names_literal_and_locations() {
        let dir = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let main = write(dir.path(), "main.sk", "import \"missing\";\n");

        let err = resolve(&main, &[root.path().to_path_buf()]).unwrap_err();
        assert_eq!(err.kind(), "NotFound");
        let message = err.to_string();
        assert!(message.contains("missing"));
        assert!(message.contains(&root.path().display().to_string()));
        assert_eq!(err.span().map(|s| s.line), Some(1));
    }

    #[test]
    fn test_library_with_metadata() {
        let dir = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        write(root.path(), "geometry/__main__.sk", "def area(w: int, h: int) -> int:\n    return w * h;\n");
        write(
            root.path(),
            "geometry/snake_metadata.json",
            r#"{"name": "geometry", "python_dependencies": ["math"]}"#,
        );
        let main = write(dir.path(), "main.sk", "import \"geometry\";\nprint(area(2, 3));\n");

        let program = resolve(&main, &[root.path().to_path_buf()]).unwrap();
        let Item::Import(Import::Host { modules, .. }) = &program.items[0] else {
            panic!("expected host import from metadata")
        };
        assert_eq!(modules[0].name, "math");
        assert!(matches!(&program.items[1], Item::Function(f) if f.name.name == "area"));
    }

    #[test]
    fn test_malformed_metadata_is_ignored() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "lib/__main__.sk", "const L: int = 1;\n");
        write(dir.path(), "lib/snake_metadata.json", "{ not json");
        let main = write(dir.path(), "main.sk", "import \"lib\";\n");

        let program = resolve(&main, &[]).unwrap();
        assert_eq!(const_names(&program), vec!["L"]);
        assert_eq!(program.items.len(), 1);
    }

    #[test]
    fn test_library_single_file_form() {
        let dir = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        write(root.path(), "util.sk", "const U: int = 7;\n");
        let main = write(dir.path(), "main.sk", "import \"util\";\n");

        let program = resolve(&main, &[root.path().to_path_buf()]).unwrap();
        assert_eq!(const_names(&program), vec!["U"]);
    }

    #[test]
    fn test_host_imports_deduplicated() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.sk", "from python import math, os;\n");
        let main = write(
            dir.path(),
            "main.sk",
            "from python import math;\nimport \"a.sk\";\nfrom python import numpy as np, math;\n",
        );

        let program = resolve(&main, &[]).unwrap();
        let names: Vec<String> = program
            .items
            .iter()
            .flat_map(|item| match item {
                Item::Import(Import::Host { modules, .. }) => {
                    modules.iter().map(|m| m.name.clone()).collect::<Vec<_>>()
                }
                _ => Vec::new(),
            })
            .collect();
        assert_eq!(names, vec!["math", "os", "numpy"]);
    }

    #[test]
    fn test_parse_error_in_import_keeps_file_table() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "bad.sk", "def f(x) -> None:\n    pass;\n");
        let main = write(dir.path(), "main.sk", "import \"bad.sk\";\n");

        let mut resolver = ModuleResolver::new(Vec::new());
        let err = resolver.resolve(&main).unwrap_err();
        assert_eq!(err.kind(), "MissingTypeAnnotation");
        let file_id = err.span().unwrap().file_id;
        assert!(resolver.files()[file_id].ends_with("bad.sk"));
    }

    #[test]
    fn test_missing_entry_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve(&dir.path().join("nope.sk"), &[]).unwrap_err();
        assert_eq!(err.kind(), "Io");
    }
}
