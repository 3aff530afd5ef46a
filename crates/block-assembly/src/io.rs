//! JSON persistence for assemblies.
//!
//! An assembly is stored as flat node and edge lists (see
//! [`AssemblyData`](crate::assembly::AssemblyData)). Loading revalidates the
//! graph, so a file with dangling or duplicate edges is rejected.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::assembly::Assembly;
use crate::error::{AssemblyError, AssemblyResult};

/// Serialize an assembly to a pretty-printed JSON string.
pub fn to_json_string(assembly: &Assembly) -> AssemblyResult<String> {
    serde_json::to_string_pretty(assembly).map_err(|e| AssemblyError::ParseError {
        what: "assembly".to_string(),
        details: e.to_string(),
    })
}

/// Parse an assembly from a JSON string.
pub fn from_json_str(json: &str) -> AssemblyResult<Assembly> {
    serde_json::from_str(json).map_err(|e| AssemblyError::ParseError {
        what: "assembly JSON".to_string(),
        details: e.to_string(),
    })
}

/// Write an assembly to a JSON file.
pub fn save_assembly(assembly: &Assembly, path: &Path) -> AssemblyResult<()> {
    let file = File::create(path).map_err(|e| AssemblyError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, assembly).map_err(|e| AssemblyError::IoWrite {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    writer.flush().map_err(|e| AssemblyError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    info!(
        "Saved assembly ({} blocks, {} edges) to {:?}",
        assembly.node_count(),
        assembly.edge_count(),
        path
    );
    Ok(())
}

/// Read an assembly from a JSON file.
pub fn load_assembly(path: &Path) -> AssemblyResult<Assembly> {
    let file = File::open(path).map_err(|e| AssemblyError::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let reader = BufReader::new(file);

    let assembly: Assembly =
        serde_json::from_reader(reader).map_err(|e| AssemblyError::ParseError {
            what: path.display().to_string(),
            details: e.to_string(),
        })?;

    debug!(
        "Loaded assembly from {:?}: {} blocks, {} edges, {} interfaces",
        path,
        assembly.node_count(),
        assembly.edge_count(),
        assembly.interface_count()
    );
    Ok(assembly)
}
