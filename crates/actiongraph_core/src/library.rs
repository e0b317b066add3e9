// SPDX-License-Identifier: MIT OR Apache-2.0
//! Action library: where action kinds and graph templates come from.
//!
//! The engine only talks to a library through [`ActionLibrary`]. The
//! file-system [`Library`] groups entries into teams. Ids take the form
//! `team:Name`; an id without a team searches the default team first and
//! then the others in registration order.

use crate::action::ActionKind;
use crate::actions::{builtin_actions, DEFAULT_TEAM};
use crate::config::{LibraryConfig, TeamConfig};
use crate::document::Document;
use crate::error::{ActionError, Result};
use crate::id::ObjectId;
use crate::naming::match_name;
use crate::serialize::{read_data, ObjectData, GRAPH_EXT};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Sub-directory of a library path holding graph templates
pub const GRAPHS_DIR: &str = "graphs";

/// Source of action kinds and graph templates
pub trait ActionLibrary {
    /// Whether an action id is known
    fn has_action(&self, id: &str) -> bool;

    /// Whether a graph template id is known
    fn has_graph(&self, id: &str) -> bool;

    /// Prototype of an action
    fn action_kind(&self, id: &str) -> Option<Rc<dyn ActionKind>>;

    /// Serialized content of a graph template
    fn graph_template(&self, id: &str) -> Result<ObjectData>;

    /// Instantiate an action, named after its type unless `name` is given
    fn create_action(
        &self,
        doc: &mut Document,
        id: &str,
        name: Option<&str>,
        graph: Option<ObjectId>,
    ) -> Result<ObjectId> {
        let kind = self
            .action_kind(id)
            .ok_or_else(|| ActionError::Library(id.to_string()))?;
        let name = name.map_or_else(|| kind.name().to_string(), str::to_string);
        doc.create_action(kind, &name, graph)
    }

    /// Create an empty graph, or a referenced instance of a template
    fn create_graph(
        &self,
        doc: &mut Document,
        source: Option<&str>,
        name: Option<&str>,
        graph: Option<ObjectId>,
    ) -> Result<ObjectId> {
        let Some(source) = source else {
            return doc.create_graph(name.unwrap_or("ActionGraph"), graph);
        };
        let template = self.graph_template(source)?;
        let default_name = source.rsplit(':').next().unwrap_or(source);
        let id = doc.create_graph(name.unwrap_or(default_name), graph)?;
        if let Err(err) = doc.load_template(id, source, &template, self) {
            doc.delete_object(id);
            return Err(err);
        }
        doc.resolve_scripts();
        Ok(id)
    }
}

#[derive(Default)]
struct Team {
    actions: IndexMap<String, Rc<dyn ActionKind>>,
    graphs: IndexMap<String, PathBuf>,
}

/// Teams of action kinds and graph templates
pub struct Library {
    teams: IndexMap<String, Team>,
    default_team: String,
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("teams", &self.teams.keys().collect::<Vec<_>>())
            .field("default_team", &self.default_team)
            .finish()
    }
}

impl Library {
    /// A library holding the builtin actions
    pub fn new() -> Self {
        let mut library = Self {
            teams: IndexMap::new(),
            default_team: DEFAULT_TEAM.to_string(),
        };
        for kind in builtin_actions() {
            library.register_action(DEFAULT_TEAM, kind);
        }
        library
    }

    /// Builtin actions plus the graph templates found under the configured
    /// library paths
    pub fn from_config(config: &LibraryConfig) -> Result<Self> {
        let mut library = Self::new();
        library.default_team = config.default_team.clone();
        for path in &config.lib_paths {
            if !path.is_dir() {
                warn!(path = %path.display(), "Library path not found");
                continue;
            }
            let team = match TeamConfig::load(path)?.team_name {
                Some(team) => team,
                None => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| DEFAULT_TEAM.to_string()),
            };
            library.scan_graphs(&team, &path.join(GRAPHS_DIR))?;
        }
        info!(
            teams = library.teams.len(),
            actions = library.list_actions(None, None, None).len(),
            graphs = library.list_graphs(None, None).len(),
            "Library loaded"
        );
        Ok(library)
    }

    /// Add an action kind to a team, replacing one of the same name
    pub fn register_action(&mut self, team: &str, kind: Rc<dyn ActionKind>) {
        let name = kind.name().to_string();
        debug!(team, action = %name, "Registered action");
        self.teams.entry(team.to_string()).or_default().actions.insert(name, kind);
    }

    /// Add a graph template file to a team
    pub fn register_graph(&mut self, team: &str, name: &str, path: PathBuf) {
        debug!(team, graph = name, path = %path.display(), "Registered graph");
        self.teams
            .entry(team.to_string())
            .or_default()
            .graphs
            .insert(name.to_string(), path);
    }

    fn scan_graphs(&mut self, team: &str, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Ok(());
        }
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        entries.sort();
        for path in entries {
            if path.is_dir() {
                self.scan_graphs(team, &path)?;
            } else if path.extension().and_then(|e| e.to_str()) == Some(GRAPH_EXT) {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) {
                    self.register_graph(team, &name, path);
                }
            }
        }
        Ok(())
    }

    /// Teams in lookup order, the default team first
    fn lookup_order(&self) -> impl Iterator<Item = (&String, &Team)> {
        let default = self.teams.get_key_value(&self.default_team);
        default
            .into_iter()
            .chain(self.teams.iter().filter(move |(name, _)| **name != self.default_team))
    }

    fn find<'a, T>(&'a self, id: &str, entries: impl Fn(&'a Team) -> &'a IndexMap<String, T>) -> Option<(&'a str, &'a T)> {
        match id.split_once(':') {
            Some((team, name)) => {
                let (team, entry) = self.teams.get_key_value(team)?;
                entries(entry).get(name).map(|v| (team.as_str(), v))
            }
            None => self
                .lookup_order()
                .find_map(|(team, entry)| entries(entry).get(id).map(|v| (team.as_str(), v))),
        }
    }

    /// Full `team:Name` id of an action
    pub fn action_id(&self, id: &str) -> Option<String> {
        self.find(id, |t| &t.actions).map(|(team, kind)| format!("{team}:{}", kind.name()))
    }

    /// File of a graph template
    pub fn graph_path(&self, id: &str) -> Option<&Path> {
        self.find(id, |t| &t.graphs).map(|(_, path)| path.as_path())
    }

    /// Action ids filtered by tag, app and a name pattern
    pub fn list_actions(&self, tag: Option<&str>, app: Option<&str>, pattern: Option<&str>) -> Vec<String> {
        self.lookup_order()
            .flat_map(|(team, entry)| entry.actions.iter().map(move |(name, kind)| (team, name, kind)))
            .filter(|(_, _, kind)| tag.map_or(true, |tag| kind.tags().iter().any(|t| *t == tag)))
            .filter(|(_, _, kind)| app.map_or(true, |app| kind.app() == Some(app)))
            .filter(|(_, name, _)| pattern.map_or(true, |p| match_name(name, p)))
            .map(|(team, name, _)| format!("{team}:{name}"))
            .collect()
    }

    /// Graph template ids filtered by team and a name pattern
    pub fn list_graphs(&self, team: Option<&str>, pattern: Option<&str>) -> Vec<String> {
        self.lookup_order()
            .filter(|(name, _)| team.map_or(true, |t| *name == t))
            .flat_map(|(team, entry)| entry.graphs.keys().map(move |name| (team, name)))
            .filter(|(_, name)| pattern.map_or(true, |p| match_name(name, p)))
            .map(|(team, name)| format!("{team}:{name}"))
            .collect()
    }
}

impl ActionLibrary for Library {
    fn has_action(&self, id: &str) -> bool {
        self.find(id, |t| &t.actions).is_some()
    }

    fn has_graph(&self, id: &str) -> bool {
        self.graph_path(id).is_some_and(Path::is_file)
    }

    fn action_kind(&self, id: &str) -> Option<Rc<dyn ActionKind>> {
        self.find(id, |t| &t.actions).map(|(_, kind)| kind.clone())
    }

    fn graph_template(&self, id: &str) -> Result<ObjectData> {
        let path = self.graph_path(id).ok_or_else(|| ActionError::Library(id.to_string()))?;
        read_data(path)
    }
}
