//! In-memory registry of open tables and views, backed by `base_dir` on
//! disk. `Database` (see [`crate::db`]) owns one `Catalog` per opened
//! database directory.

use crate::meta::TableMeta;
use crate::rc::{Result, RC};
use crate::table::Table;
use crate::view::View;
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub struct Catalog {
    pub base_dir: PathBuf,
    tables: RefCell<HashMap<String, Rc<Table>>>,
    views: RefCell<HashMap<String, Rc<View>>>,
    next_table_id: RefCell<u64>,
}

impl Catalog {
    /// Open (or create) a catalog rooted at `base_dir`, loading every
    /// `<name>.table` meta file found there plus the `__miniob_views__`
    /// system table if present.
    pub fn open(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir).map_err(|_| RC::IoerrOpen)?;
        let mut tables = HashMap::default();
        let mut max_id = 0u64;
        if let Ok(entries) = std::fs::read_dir(base_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("table") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        let meta = TableMeta::load(base_dir, stem)?;
                        max_id = max_id.max(meta.id);
                        tables.insert(stem.to_string(), Rc::new(Table::open(base_dir, meta)?));
                    }
                }
            }
        }
        let cat = Self {
            base_dir: base_dir.to_path_buf(),
            tables: RefCell::new(tables),
            views: RefCell::new(HashMap::default()),
            next_table_id: RefCell::new(max_id + 1),
        };
        if cat.tables.borrow().contains_key(View::SYSTEM_TABLE) {
            let loaded = View::load_all(&cat)?;
            *cat.views.borrow_mut() = loaded;
        }
        Ok(cat)
    }

    pub fn allocate_table_id(&self) -> u64 {
        let mut id = self.next_table_id.borrow_mut();
        let v = *id;
        *id += 1;
        v
    }

    pub fn table(&self, name: &str) -> Option<Rc<Table>> {
        self.tables.borrow().get(name).cloned()
    }

    pub fn view(&self, name: &str) -> Option<Rc<View>> {
        self.views.borrow().get(name).cloned()
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.tables.borrow().contains_key(name) || self.views.borrow().contains_key(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn register_table(&self, table: Table) -> Rc<Table> {
        let rc = Rc::new(table);
        self.tables.borrow_mut().insert(rc.meta().name.clone(), rc.clone());
        rc
    }

    pub fn register_view(&self, view: View) -> Rc<View> {
        let rc = Rc::new(view);
        self.views.borrow_mut().insert(rc.name.clone(), rc.clone());
        rc
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        let table = self.tables.borrow_mut().remove(name).ok_or(RC::SchemaTableNotExist)?;
        let meta = table.meta().clone();
        drop(table);
        for ext in ["table", "data", "text", "vec"] {
            let _ = std::fs::remove_file(self.base_dir.join(format!("{name}.{ext}")));
        }
        for idx in &meta.indexes {
            let _ = std::fs::remove_file(TableMeta::index_path(&self.base_dir, name, &idx.name));
        }
        for vidx in &meta.vector_indexes {
            let (vecidx_path, aux_path) = TableMeta::vector_index_paths(&self.base_dir, name, &vidx.name);
            let _ = std::fs::remove_file(vecidx_path);
            let _ = std::fs::remove_file(aux_path);
        }
        Ok(())
    }
}
