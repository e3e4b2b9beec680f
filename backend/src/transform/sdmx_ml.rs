//! SDMX-ML (GenericData XML) summaries.
//!
//! Only the observation count and field ids are read, the same summary the JSON
//! path gives through [`summarize`](super::sdmx::summarize). Namespace prefixes
//! are ignored and records are not decoded from XML.
//!
//! Observations are the `Obs` children of `GenericData/DataSet`. Field ids come
//! from the first observation: its `ObsKey/Value@id` entries, then its
//! `Attributes/Value@id` entries.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::sdmx::PayloadSummary;
use crate::error::{DecodeError, DecodeResult};

const ROOT: &str = "GenericData";
const DATA_SET: &str = "DataSet";
const OBS: &str = "Obs";
const OBS_KEY: &str = "ObsKey";
const ATTRIBUTES: &str = "Attributes";
const VALUE: &str = "Value";

/// Observation count and field ids of a GenericData message.
pub fn summarize_xml(xml: &str) -> DecodeResult<PayloadSummary> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut summary = XmlSummary::default();

    loop {
        match reader.read_event().map_err(unparsable)? {
            Event::Start(e) => {
                let name = local_name(&e);
                summary.element(&path, &name, &e)?;
                path.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                summary.element(&path, &name, &e)?;
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = path.last() {
        return Err(unparsable(format!("<{}> is never closed", open)));
    }
    summary.finish()
}

#[derive(Default)]
struct XmlSummary {
    root: bool,
    data_set: bool,
    count: usize,
    keys: Vec<String>,
    attributes: Vec<String>,
}

impl XmlSummary {
    fn element(&mut self, parents: &[String], name: &str, element: &BytesStart) -> DecodeResult<()> {
        let parents: Vec<&str> = parents.iter().map(String::as_str).collect();

        match (parents.as_slice(), name) {
            ([], ROOT) => self.root = true,
            ([], other) => {
                return Err(DecodeError::InvalidPayload(format!(
                    "expected a {} message, found <{}>",
                    ROOT, other
                )))
            }
            ([ROOT], DATA_SET) => self.data_set = true,
            ([ROOT, DATA_SET], OBS) => self.count += 1,
            ([ROOT, DATA_SET, OBS, OBS_KEY], VALUE) if self.count == 1 => {
                self.keys.push(id_of(element)?);
            }
            ([ROOT, DATA_SET, OBS, ATTRIBUTES], VALUE) if self.count == 1 => {
                self.attributes.push(id_of(element)?);
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> DecodeResult<PayloadSummary> {
        if !self.root {
            return Err(DecodeError::InvalidPayload(format!("no {} element", ROOT)));
        }
        if !self.data_set {
            return Err(DecodeError::InvalidPayload(format!("{} has no {}", ROOT, DATA_SET)));
        }

        let mut fields = self.keys;
        fields.extend(self.attributes);
        Ok(PayloadSummary {
            count: self.count,
            fields,
            layer_name: None,
        })
    }
}

fn local_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn id_of(element: &BytesStart) -> DecodeResult<String> {
    match element.try_get_attribute("id") {
        Ok(Some(attribute)) => Ok(String::from_utf8_lossy(&attribute.value).into_owned()),
        Ok(None) => Err(DecodeError::InvalidPayload(format!(
            "<{}> without an id",
            local_name(element)
        ))),
        Err(e) => Err(unparsable(e)),
    }
}

fn unparsable(e: impl std::fmt::Display) -> DecodeError {
    DecodeError::InvalidPayload(format!("unable to parse SDMX-ML: {}", e))
}
