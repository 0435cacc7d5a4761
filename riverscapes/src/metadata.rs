//! XML records of what a tool did: a standalone per-run file, and the project file shared by every
//! tool working in one Riverscapes project.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use rand::Rng;
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::DatasetKind;

/// Realizations of this project type are stored under this tag
pub const REALIZATION_TAG: &str = "Solar";
pub const PRODUCT_VERSION: &str = "0.1";

/// Somewhere a tool records its parameters, outputs, and free-form facts about a run.
pub trait MetadataSink {
    fn add_parameter(&mut self, name: &str, value: &str) -> Result<()>;
    fn add_output(&mut self, output: Dataset) -> Result<()>;
    fn add_meta(&mut self, name: &str, value: &str) -> Result<()>;
    fn write(&self, path: &Path) -> Result<()>;
}

/// An input or output file, as listed in metadata. `path` is relative to the project root in a
/// project file, and whatever the user passed in elsewhere.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub kind: DatasetKind,
    pub id: Option<String>,
    pub guid: Option<String>,
    pub name: String,
    pub path: String,
}

impl Dataset {
    pub fn new<S1: Into<String>, S2: Into<String>>(
        kind: DatasetKind,
        name: S1,
        path: S2,
    ) -> Dataset {
        Dataset {
            kind,
            id: None,
            guid: None,
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Dataset {
        self.id = Some(id.into());
        self
    }

    fn to_xml(&self) -> Element {
        let mut elem = Element::new(self.kind.tag());
        if let Some(ref id) = self.id {
            elem.attributes.insert("id".to_string(), id.clone());
        }
        if let Some(ref guid) = self.guid {
            elem.attributes.insert("guid".to_string(), guid.clone());
        }
        push(&mut elem, text_elem("Name", &self.name));
        push(&mut elem, text_elem("Path", &self.path));
        elem
    }

    fn from_xml(elem: &Element) -> Result<Dataset> {
        let kind = DatasetKind::from_tag(&elem.name)
            .ok_or_else(|| anyhow!("<{}> isn't a kind of dataset", elem.name))?;
        Ok(Dataset {
            kind,
            id: elem.attributes.get("id").cloned(),
            guid: elem.attributes.get("guid").cloned(),
            name: child_text(elem, "Name").unwrap_or_default(),
            path: child_text(elem, "Path")
                .ok_or_else(|| anyhow!("<{}> is missing a <Path>", elem.name))?,
        })
    }
}

/// The metadata file each tool run writes next to its output.
pub struct RunMetadata {
    tool: String,
    version: String,
    params: Vec<(String, String)>,
    outputs: Vec<Dataset>,
    meta: Vec<(String, String)>,
    start: DateTime<Local>,
    stop: Option<DateTime<Local>>,
    status: Option<String>,
}

impl RunMetadata {
    /// Starts the clock on a run.
    pub fn new(tool: &str, version: &str) -> RunMetadata {
        RunMetadata {
            tool: tool.to_string(),
            version: version.to_string(),
            params: Vec::new(),
            outputs: Vec::new(),
            meta: Vec::new(),
            start: Local::now(),
            stop: None,
            status: None,
        }
    }

    /// Stops the clock. Returns the start and stop times, formatted like everything else in
    /// metadata.
    pub fn finalize(&mut self, status: &str) -> (String, String) {
        let stop = Local::now();
        self.stop = Some(stop);
        self.status = Some(status.to_string());
        (timestamp(&self.start), timestamp(&stop))
    }

    pub fn params(&self) -> &Vec<(String, String)> {
        &self.params
    }

    pub fn outputs(&self) -> &Vec<Dataset> {
        &self.outputs
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn to_xml(&self) -> Element {
        let mut root = Element::new("Metadata");
        let mut tool = Element::new("Tool");
        push(&mut tool, text_elem("Name", &self.tool));
        push(&mut tool, text_elem("Version", &self.version));
        push(&mut root, tool);

        let mut run = Element::new("Run");
        push(&mut run, named_values("Parameters", "Param", &self.params));
        let mut outputs = Element::new("Outputs");
        for output in &self.outputs {
            let mut elem = Element::new("Output");
            elem.attributes
                .insert("name".to_string(), output.name.clone());
            elem.children.push(XMLNode::Text(output.path.clone()));
            push(&mut outputs, elem);
        }
        push(&mut run, outputs);
        if !self.meta.is_empty() {
            push(&mut run, named_values("MetaData", "Meta", &self.meta));
        }
        push(&mut run, text_elem("TimeStart", &timestamp(&self.start)));
        if let Some(ref stop) = self.stop {
            push(&mut run, text_elem("TimeStop", &timestamp(stop)));
        }
        if let Some(ref status) = self.status {
            push(&mut run, text_elem("Status", status));
        }
        push(&mut root, run);
        root
    }
}

impl MetadataSink for RunMetadata {
    fn add_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        self.params.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn add_output(&mut self, output: Dataset) -> Result<()> {
        self.outputs.push(output);
        Ok(())
    }

    fn add_meta(&mut self, name: &str, value: &str) -> Result<()> {
        self.meta.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn write(&self, path: &Path) -> Result<()> {
        write_xml(&self.to_xml(), path)
    }
}

/// Named like `meta_polystat_201701021530.xml`
pub fn run_metadata_file_name(prefix: &str, time: &NaiveDateTime) -> String {
    format!("meta_{}_{}.xml", prefix, time.format("%Y%m%d%H%M"))
}

#[derive(Clone, Debug, PartialEq)]
pub enum RealizationInput {
    /// Points at one of the project's inputs or another realization's outputs, by id
    Ref { kind: DatasetKind, id: String },
    Dataset(Dataset),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Realization {
    pub id: String,
    pub name: String,
    pub date_created: String,
    pub product_version: String,
    pub guid: String,
    pub meta: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub inputs: Vec<RealizationInput>,
    pub outputs: Vec<Dataset>,
}

/// A Riverscapes project file. Tools add to the realization they selected most recently.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectXml {
    pub name: String,
    pub project_type: String,
    pub meta: Vec<(String, String)>,
    pub inputs: Vec<Dataset>,
    pub realizations: Vec<Realization>,
    current: Option<usize>,
}

impl ProjectXml {
    pub fn new(name: &str, project_type: &str) -> ProjectXml {
        ProjectXml {
            name: name.to_string(),
            project_type: project_type.to_string(),
            meta: Vec::new(),
            inputs: Vec::new(),
            realizations: Vec::new(),
            current: None,
        }
    }

    pub fn load(path: &Path) -> Result<ProjectXml> {
        let file = fs_err::File::open(path)?;
        let root = Element::parse(file).with_context(|| format!("parsing {}", path.display()))?;
        ProjectXml::from_xml(&root).with_context(|| format!("reading {}", path.display()))
    }

    pub fn add_project_meta(&mut self, name: &str, value: &str) {
        self.meta.push((name.to_string(), value.to_string()));
    }

    /// Returns the new input's guid.
    pub fn add_project_input(&mut self, mut input: Dataset) -> String {
        let guid = new_guid();
        input.guid = Some(guid.clone());
        self.inputs.push(input);
        guid
    }

    /// Adds an empty realization, stamped with who made it and where, and selects it.
    pub fn add_realization(
        &mut self,
        name: &str,
        id: &str,
        date_created: &str,
    ) -> &mut Realization {
        self.realizations.push(Realization {
            id: id.to_string(),
            name: name.to_string(),
            date_created: date_created.to_string(),
            product_version: PRODUCT_VERSION.to_string(),
            guid: new_guid(),
            meta: vec![
                ("Operator".to_string(), operator()),
                ("ComputerID".to_string(), computer_id()),
            ],
            params: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        let last = self.realizations.len() - 1;
        self.current = Some(last);
        &mut self.realizations[last]
    }

    /// Maps realization names to their ids.
    pub fn realization_ids(&self) -> BTreeMap<String, String> {
        self.realizations
            .iter()
            .map(|r| (r.name.clone(), r.id.clone()))
            .collect()
    }

    /// Selects an existing realization by name and returns its id.
    pub fn select_realization(&mut self, name: &str) -> Result<String> {
        match self.realizations.iter().position(|r| r.name == name) {
            Some(idx) => {
                self.current = Some(idx);
                Ok(self.realizations[idx].id.clone())
            }
            None => bail!(
                "No realization named {} in project {}; have {:?}",
                name,
                self.name,
                self.realization_ids().keys().collect::<Vec<_>>()
            ),
        }
    }

    pub fn current_realization(&mut self) -> Result<&mut Realization> {
        match self.current {
            Some(idx) => Ok(&mut self.realizations[idx]),
            None => bail!("No realization selected in project {}", self.name),
        }
    }

    pub fn add_input_ref(&mut self, kind: DatasetKind, id: &str) -> Result<()> {
        self.current_realization()?
            .inputs
            .push(RealizationInput::Ref {
                kind,
                id: id.to_string(),
            });
        Ok(())
    }

    pub fn add_input(&mut self, mut input: Dataset) -> Result<()> {
        input.guid = Some(new_guid());
        self.current_realization()?
            .inputs
            .push(RealizationInput::Dataset(input));
        Ok(())
    }

    fn to_xml(&self) -> Element {
        let mut root = Element::new("Project");
        push(&mut root, text_elem("Name", &self.name));
        push(&mut root, text_elem("ProjectType", &self.project_type));
        push(&mut root, named_values("MetaData", "Meta", &self.meta));
        let mut inputs = Element::new("Inputs");
        for input in &self.inputs {
            push(&mut inputs, input.to_xml());
        }
        push(&mut root, inputs);

        let mut realizations = Element::new("Realizations");
        for r in &self.realizations {
            let mut elem = Element::new(REALIZATION_TAG);
            for (key, value) in [
                ("id", &r.id),
                ("dateCreated", &r.date_created),
                ("productVersion", &r.product_version),
                ("guid", &r.guid),
            ] {
                elem.attributes.insert(key.to_string(), value.clone());
            }
            push(&mut elem, text_elem("Name", &r.name));
            push(&mut elem, named_values("MetaData", "Meta", &r.meta));
            push(&mut elem, named_values("Parameters", "Param", &r.params));

            let mut inputs = Element::new("Inputs");
            for input in &r.inputs {
                push(
                    &mut inputs,
                    match input {
                        RealizationInput::Ref { kind, id } => {
                            let mut e = Element::new(kind.tag());
                            e.attributes.insert("ref".to_string(), id.clone());
                            e
                        }
                        RealizationInput::Dataset(dataset) => dataset.to_xml(),
                    },
                );
            }
            push(&mut elem, inputs);

            let mut outputs = Element::new("Outputs");
            for output in &r.outputs {
                push(&mut outputs, output.to_xml());
            }
            let mut analysis = Element::new("Analysis");
            push(&mut analysis, outputs);
            let mut analyses = Element::new("Analyses");
            push(&mut analyses, analysis);
            push(&mut elem, analyses);

            push(&mut realizations, elem);
        }
        push(&mut root, realizations);
        root
    }

    fn from_xml(root: &Element) -> Result<ProjectXml> {
        if root.name != "Project" {
            bail!("root element is <{}>, not <Project>", root.name);
        }
        let mut project = ProjectXml::new(
            &child_text(root, "Name").unwrap_or_default(),
            &child_text(root, "ProjectType").unwrap_or_default(),
        );
        project.meta = read_named_values(root, "MetaData");
        if let Some(inputs) = root.get_child("Inputs") {
            for elem in child_elements(inputs) {
                project.inputs.push(Dataset::from_xml(elem)?);
            }
        }

        if let Some(realizations) = root.get_child("Realizations") {
            for elem in child_elements(realizations) {
                let attr = |key: &str| elem.attributes.get(key).cloned().unwrap_or_default();
                let mut inputs = Vec::new();
                if let Some(list) = elem.get_child("Inputs") {
                    for input in child_elements(list) {
                        inputs.push(match input.attributes.get("ref") {
                            Some(id) => RealizationInput::Ref {
                                kind: DatasetKind::from_tag(&input.name).ok_or_else(|| {
                                    anyhow!("<{}> isn't a kind of dataset", input.name)
                                })?,
                                id: id.clone(),
                            },
                            None => RealizationInput::Dataset(Dataset::from_xml(input)?),
                        });
                    }
                }
                let mut outputs = Vec::new();
                if let Some(list) = elem
                    .get_child("Analyses")
                    .and_then(|e| e.get_child("Analysis"))
                    .and_then(|e| e.get_child("Outputs"))
                {
                    for output in child_elements(list) {
                        outputs.push(Dataset::from_xml(output)?);
                    }
                }

                let id = attr("id");
                if id.is_empty() {
                    bail!("a realization is missing its id");
                }
                project.realizations.push(Realization {
                    id,
                    name: child_text(elem, "Name").unwrap_or_default(),
                    date_created: attr("dateCreated"),
                    product_version: attr("productVersion"),
                    guid: attr("guid"),
                    meta: read_named_values(elem, "MetaData"),
                    params: read_named_values(elem, "Parameters"),
                    inputs,
                    outputs,
                });
            }
        }
        Ok(project)
    }
}

impl MetadataSink for ProjectXml {
    fn add_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        self.current_realization()?
            .params
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn add_output(&mut self, mut output: Dataset) -> Result<()> {
        output.guid = Some(new_guid());
        self.current_realization()?.outputs.push(output);
        Ok(())
    }

    fn add_meta(&mut self, name: &str, value: &str) -> Result<()> {
        self.current_realization()?
            .meta
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn write(&self, path: &Path) -> Result<()> {
        write_xml(&self.to_xml(), path)
    }
}

/// A random version 4 UUID, in uppercase
pub fn new_guid() -> String {
    let mut bytes: [u8; 16] = rand::thread_rng().gen();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

pub fn timestamp<Tz: chrono::TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn operator() -> String {
    env_or_unknown(&["USER", "USERNAME", "LOGNAME"])
}

fn computer_id() -> String {
    env_or_unknown(&["HOSTNAME", "COMPUTERNAME"])
}

fn env_or_unknown(keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| std::env::var(key).ok().filter(|x| !x.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn write_xml(root: &Element, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    let mut file = fs_err::File::create(path)?;
    root.write_with_config(
        &mut file,
        EmitterConfig::new()
            .perform_indent(true)
            .indent_string("\t"),
    )
    .with_context(|| format!("writing {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn push(parent: &mut Element, child: Element) {
    parent.children.push(XMLNode::Element(child));
}

fn text_elem(name: &str, text: &str) -> Element {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(text.to_string()));
    elem
}

fn child_elements(elem: &Element) -> impl Iterator<Item = &Element> {
    elem.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

fn child_text(elem: &Element, name: &str) -> Option<String> {
    elem.get_child(name)
        .and_then(|child| child.get_text())
        .map(|text| text.trim().to_string())
}

// <MetaData><Meta name="x">y</Meta></MetaData>
fn named_values(container: &str, item: &str, values: &[(String, String)]) -> Element {
    let mut elem = Element::new(container);
    for (name, value) in values {
        let mut child = text_elem(item, value);
        child.attributes.insert("name".to_string(), name.clone());
        push(&mut elem, child);
    }
    elem
}

fn read_named_values(parent: &Element, container: &str) -> Vec<(String, String)> {
    let container = match parent.get_child(container) {
        Some(elem) => elem,
        None => return Vec::new(),
    };
    child_elements(container)
        .filter_map(|elem| {
            let name = elem.attributes.get("name")?.clone();
            let value = elem
                .get_text()
                .map(|text| text.trim().to_string())
                .unwrap_or_default();
            Some((name, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn guids() {
        let guid = new_guid();
        assert_eq!(guid.len(), 36);
        assert_eq!(guid.to_uppercase(), guid);
        assert_eq!(&guid[14..15], "4");
        assert_ne!(guid, new_guid());
    }

    #[test]
    fn run_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut meta = RunMetadata::new("Calculate Solar Insolation for a Stream Network", "0.1");
        meta.add_parameter("Day interval", "14").unwrap();
        meta.add_output(Dataset::new(DatasetKind::Raster, "Output solar raster dataset", "out.tif"))
            .unwrap();
        let (start, stop) = meta.finalize("Success");
        assert!(start <= stop);
        assert_eq!(meta.status(), Some("Success"));

        let time = NaiveDate::from_ymd_opt(2017, 1, 2)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap();
        let name = run_metadata_file_name("polystat", &time);
        assert_eq!(name, "meta_polystat_201701021530.xml");
        let path = dir.path().join(name);
        meta.write(&path).unwrap();

        let root = Element::parse(fs_err::File::open(&path).unwrap()).unwrap();
        let run = root.get_child("Run").unwrap();
        assert_eq!(
            read_named_values(run, "Parameters"),
            vec![("Day interval".to_string(), "14".to_string())]
        );
        assert_eq!(child_text(run, "Status").unwrap(), "Success");
        assert_eq!(
            child_text(root.get_child("Tool").unwrap(), "Version").unwrap(),
            "0.1"
        );
    }

    #[test]
    fn project_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.rs.xml");

        let mut project = ProjectXml::new("Lemhi solar", "Solar");
        project.add_project_meta("HUCID", "17060204");
        project.add_project_input(
            Dataset::new(DatasetKind::Raster, "Bare earth DEM raster dataset", "Inputs/dem.tif")
                .with_id("DEM"),
        );
        // Nothing is selected yet
        assert!(project.add_parameter("Day interval", "14").is_err());

        let added =
            project.add_realization("first run", "real201701021530", "2017-01-02T15:31:00");
        assert_eq!(added.id, "real201701021530");
        assert_eq!(added.product_version, PRODUCT_VERSION);
        project.add_parameter("Day interval", "14").unwrap();
        project.add_input_ref(DatasetKind::Raster, "DEM").unwrap();
        project
            .add_input(Dataset::new(
                DatasetKind::Vector,
                "Stream network polyline feature class",
                "Realizations/real201701021530/SolarRaster/streams.geojson",
            ))
            .unwrap();
        project
            .add_output(
                Dataset::new(
                    DatasetKind::Raster,
                    "Solar insolation raster dataset",
                    "Realizations/real201701021530/SolarRaster/solar.tif",
                )
                .with_id("SOL_RAS"),
            )
            .unwrap();
        project.write(&path).unwrap();

        let mut back = ProjectXml::load(&path).unwrap();
        assert_eq!(back, ProjectXml { current: None, ..project.clone() });

        // A later tool picks up the same realization by name
        assert!(back.select_realization("other run").is_err());
        assert_eq!(
            back.select_realization("first run").unwrap(),
            "real201701021530"
        );
        back.add_input_ref(DatasetKind::Raster, "SOL_RAS").unwrap();
        back.add_output(
            Dataset::new(DatasetKind::Vector, "Output polyline feature with solar values", "x")
                .with_id("PRED_SOLAR"),
        )
        .unwrap();
        let r = &back.realizations[0];
        assert_eq!(r.inputs.len(), 3);
        assert_eq!(r.outputs.len(), 2);
        assert!(r.outputs.iter().all(|o| o.guid.is_some()));
        assert_eq!(r.meta[0].0, "Operator");
    }
}
