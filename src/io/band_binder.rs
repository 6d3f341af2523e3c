//! Binding of raster nodes to their sidecar payload files

use crate::core::product::{Product, SidecarState};
use crate::io::constants::*;
use crate::io::document::{Document, NodeId};
use crate::io::header_parser::{band_index_table, grid_index_table};
use crate::io::raster_io::payload_len;
use crate::types::{Diagnostic, DiagnosticKind, DimapResult, RasterNodeId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Sidecar paths by raster node, plus the files that could not be used
#[derive(Debug, Clone, Default)]
pub struct BindOutcome {
    pub paths: HashMap<RasterNodeId, PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Relative `href` from the header to the payload path on disk
pub fn resolve_href(base_dir: &Path, href: &str) -> PathBuf {
    let normalised = href.trim().replace('\\', "/");
    let path = match normalised.strip_suffix(ENVI_HEADER_EXTENSION) {
        Some(stem) => format!("{}{}", stem, IMAGE_FILE_EXTENSION),
        None => normalised,
    };
    base_dir.join(path)
}

pub struct BandFileBinder;

impl BandFileBinder {
    /// Bind every Data_File and Tie_Point_Grid_File entry to a node of
    /// `product`. Missing, unopenable or short payloads leave the node in
    /// place, flagged unreadable. Fails only on raster dimensions whose
    /// payload size is not representable.
    pub fn bind(product: &mut Product, doc: &Document, base_dir: &Path) -> DimapResult<BindOutcome> {
        let mut outcome = BindOutcome::default();
        let Some(root) = doc.root() else {
            return Ok(outcome);
        };
        let Some(access) = doc.find_child(root, TAG_DATA_ACCESS) else {
            log::debug!("Header has no {} section", TAG_DATA_ACCESS);
            return Ok(outcome);
        };

        let bands = band_index_table(doc, root);
        let grids = grid_index_table(doc, root);

        for file in doc.find_children(access, TAG_DATA_FILE) {
            let node = entry_node(doc, file, TAG_BAND_INDEX, &bands, |i| {
                product.bands().get(i).map(|b| b.name.clone())
            })
            .map(RasterNodeId::Band);
            bind_entry(product, doc, file, TAG_DATA_FILE_PATH, node, base_dir, &mut outcome)?;
        }
        for file in doc.find_children(access, TAG_TIE_POINT_GRID_FILE) {
            let node = entry_node(doc, file, TAG_TIE_POINT_GRID_INDEX, &grids, |i| {
                product.tie_point_grids().get(i).map(|g| g.name.clone())
            })
            .map(RasterNodeId::TiePointGrid);
            bind_entry(product, doc, file, TAG_TIE_POINT_GRID_FILE_PATH, node, base_dir, &mut outcome)?;
        }

        log::info!(
            "Bound {} sidecar file(s) for '{}', {} unavailable",
            outcome.paths.len(),
            product.name,
            outcome.diagnostics.len()
        );
        Ok(outcome)
    }
}

/// Name of the node an entry refers to, through the document index table
/// or, failing that, the node position
fn entry_node<F>(doc: &Document, file: NodeId, index_tag: &str, table: &HashMap<usize, String>, by_position: F) -> Option<String>
where
    F: Fn(usize) -> Option<String>,
{
    let index = doc.child_text(file, index_tag)?.parse::<usize>().ok()?;
    table.get(&index).cloned().or_else(|| by_position(index))
}

fn expected_len(product: &Product, node: &RasterNodeId) -> DimapResult<u64> {
    match node {
        RasterNodeId::Band(name) => product
            .band(name)
            .map_or(Ok(0), |b| payload_len(b.width, b.height, b.data_type)),
        RasterNodeId::TiePointGrid(name) => product
            .tie_point_grid(name)
            .map_or(Ok(0), |g| payload_len(g.grid_width, g.grid_height, g.data_type)),
    }
}

fn bind_entry(
    product: &mut Product,
    doc: &Document,
    file: NodeId,
    path_tag: &str,
    node: Option<RasterNodeId>,
    base_dir: &Path,
    outcome: &mut BindOutcome,
) -> DimapResult<()> {
    let Some(node) = node.filter(|n| product.sidecar_state(n).is_some()) else {
        log::warn!("Skipping <{}> entry for an unknown raster node", doc.name(file));
        return Ok(());
    };
    let Some(href) = doc
        .find_child(file, path_tag)
        .and_then(|p| doc.attribute(p, ATTRIB_HREF))
    else {
        log::warn!("No {} href for {}", path_tag, node);
        return Ok(());
    };

    let path = resolve_href(base_dir, href);
    let expected = expected_len(product, &node)?;
    let problem = match std::fs::metadata(&path) {
        Ok(meta) if !meta.is_file() => Some(format!("{} is not a regular file", path.display())),
        Ok(meta) if meta.len() < expected => Some(format!(
            "{} holds {} bytes, {} expected",
            path.display(),
            meta.len(),
            expected
        )),
        Ok(_) => std::fs::File::open(&path)
            .err()
            .map(|e| format!("{} cannot be opened: {}", path.display(), e)),
        Err(e) => Some(format!("{}: {}", path.display(), e)),
    };

    match problem {
        None => {
            log::debug!("Bound {} to {}", node, path.display());
            product.set_sidecar_state(&node, SidecarState::Bound(path.clone()));
        }
        Some(message) => {
            outcome.diagnostics.push(Diagnostic::new(
                DiagnosticKind::DataUnavailable,
                format!("sidecar of {} unusable: {}", node, message),
            ));
            product.set_sidecar_state(&node, SidecarState::Unreadable(path.clone()));
        }
    }
    outcome.paths.insert(node, path);
    Ok(())
}
