//! bank/stepped: series of banks ("steps") built on top of ImageBank.
//!
//! Bank name / id resolution, in priority order:
//! 1. forced bank "name/id" (anything but "NONE") is used verbatim;
//! 2. bank name: absent or placeholder → inherit from the last previous step;
//!    still absent → configuration error;
//! 3. bank id: explicit → as is; else step{len(previous)+1}; else step1.
//!
//! SteppedImageBank holds a reference to an ImageBank (composition) and only
//! resolves names before delegating.

use anyhow::Result;
use log::debug;
use serde_json::json;

use super::store::{BankOutput, BankRequest, ImageBank};
use super::{list_banks, BankId};
use crate::error::BankError;
use crate::events::{VideoExport, EVENT_BANK_LIST};
use crate::frames::{concat_batches, Frame, ImageBatch};

pub const BANK_NAME_PLACEHOLDER: &str = "<COPY-PREVIOUS-STEP>";
pub const NO_FORCED_BANK: &str = "NONE";

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStep {
    pub images: Option<ImageBatch>,
    pub bank_name: String,
}

pub type Series = Vec<SeriesStep>;

#[derive(Debug, Clone)]
pub struct StepRequest<'r> {
    pub cache_name: &'r str,
    /// None or BANK_NAME_PLACEHOLDER → inherit from the previous step.
    pub bank_name: Option<&'r str>,
    pub bank_id: Option<&'r BankId>,
    pub enable_write: bool,
    /// "name/id" or NO_FORCED_BANK.
    pub forced_bank: Option<&'r str>,
}

impl<'r> StepRequest<'r> {
    pub fn new(cache_name: &'r str) -> Self {
        Self {
            cache_name,
            bank_name: None,
            bank_id: None,
            enable_write: true,
            forced_bank: None,
        }
    }

    pub fn with_bank_name(mut self, name: &'r str) -> Self {
        self.bank_name = Some(name);
        self
    }

    pub fn with_bank_id(mut self, id: &'r BankId) -> Self {
        self.bank_id = Some(id);
        self
    }

    pub fn with_write(mut self, on: bool) -> Self {
        self.enable_write = on;
        self
    }

    pub fn with_forced_bank(mut self, forced: &'r str) -> Self {
        self.forced_bank = Some(forced);
        self
    }
}

#[derive(Debug, Clone)]
pub struct StepOutput {
    pub step_images: ImageBatch,
    pub step_last_image: Frame,
    /// Previous steps' images followed by this step's images.
    pub all_images: ImageBatch,
    pub series: Series,
    pub video: Option<VideoExport>,
}

/// "name/id" → Some((name, literal id)); None / "NONE" → None.
pub fn parse_forced_bank(forced: Option<&str>) -> Result<Option<(String, BankId)>> {
    let forced = match forced {
        None => return Ok(None),
        Some(f) if f == NO_FORCED_BANK => return Ok(None),
        Some(f) => f,
    };
    let mut parts = forced.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(id), None) => Ok(Some((name.to_string(), BankId::literal(id)))),
        _ => Err(BankError::config(format!(
            "forced bank '{}' must have the form <bank_name>/<bank_id>",
            forced
        ))
        .into()),
    }
}

/// Resolve (bank_name, bank_id) from the step inputs and the previous series.
pub fn resolve_bank_settings(
    bank_name: Option<&str>,
    bank_id: Option<&BankId>,
    previous: Option<&[SeriesStep]>,
) -> Result<(String, BankId)> {
    let previous = previous.filter(|p| !p.is_empty());

    let mut name = bank_name
        .filter(|n| !n.is_empty() && *n != BANK_NAME_PLACEHOLDER)
        .map(str::to_string);
    if name.is_none() {
        if let Some(last) = previous.and_then(|p| p.last()) {
            name = Some(last.bank_name.clone()).filter(|n| !n.is_empty());
        }
    }
    let name = name.ok_or_else(|| BankError::config("bank_name must be provided!"))?;

    if let Some(id) = bank_id.filter(|id| !id.is_empty()) {
        return Ok((name, id.clone()));
    }
    let step = previous.map(|p| p.len() + 1).unwrap_or(1);
    Ok((name, BankId::literal(format!("step{}", step))))
}

pub struct SteppedImageBank<'b, 'a> {
    bank: &'b ImageBank<'a>,
}

impl<'b, 'a> SteppedImageBank<'b, 'a> {
    pub fn new(bank: &'b ImageBank<'a>) -> Self {
        Self { bank }
    }

    pub fn bank(&self) -> &ImageBank<'a> {
        self.bank
    }

    fn resolve(
        &self,
        req: &StepRequest<'_>,
        previous: Option<&[SeriesStep]>,
    ) -> Result<(String, BankId)> {
        match parse_forced_bank(req.forced_bank)? {
            Some(forced) => Ok(forced),
            None => resolve_bank_settings(req.bank_name, req.bank_id, previous),
        }
    }

    /// Lazy-evaluation hook with the same resolution rules as process_step.
    pub fn check_lazy_status(
        &self,
        req: &StepRequest<'_>,
        previous: Option<&[SeriesStep]>,
    ) -> Result<Vec<&'static str>> {
        let (bank_name, bank_id) = self.resolve(req, previous)?;
        self.bank
            .check_lazy_status(req.cache_name, &bank_name, &bank_id)
    }

    pub fn process_step(
        &self,
        req: &StepRequest<'_>,
        images: Option<ImageBatch>,
        previous_series: Option<Series>,
    ) -> Result<StepOutput> {
        let previous = previous_series.filter(|p| !p.is_empty());
        let (bank_name, bank_id) = self.resolve(req, previous.as_deref())?;
        debug!("step resolved to {}/{}", bank_name, bank_id);

        if let Some(prev) = &previous {
            if let Some(i) = prev.iter().position(|s| s.images.is_none()) {
                return Err(BankError::IncompleteSeries(i).into());
            }
        }

        let bank_req = BankRequest::new(&bank_name, &bank_id)
            .with_cache(req.cache_name)
            .with_selected_index(-1)
            .with_write(req.enable_write);
        let BankOutput {
            images: step_images,
            selected: step_last_image,
            video,
        } = self.bank.process(&bank_req, images)?;

        let current = SeriesStep {
            images: Some(step_images.clone()),
            bank_name,
        };

        match previous {
            Some(mut series) => {
                let all_images = {
                    let mut parts: Vec<&ImageBatch> =
                        series.iter().filter_map(|s| s.images.as_ref()).collect();
                    parts.push(&step_images);
                    concat_batches(&parts)?
                };
                series.push(current);
                Ok(StepOutput {
                    step_images,
                    step_last_image,
                    all_images,
                    series,
                    video,
                })
            }
            None => Ok(StepOutput {
                all_images: step_images.clone(),
                step_images,
                step_last_image,
                series: vec![current],
                video,
            }),
        }
    }

    /// Choices for a forced bank: "NONE" followed by every valid bank of the
    /// cache as sorted "name/id". Also published as `persistence.bank_list`.
    pub fn forced_bank_choices(&self, cache_name: &str) -> Result<Vec<String>> {
        let root = self.bank.registry().get_cache_root(cache_name)?;
        let banks = list_banks(&root)?;

        self.bank
            .events()
            .publish(EVENT_BANK_LIST, json!({ "banks": banks }));

        let mut keys: Vec<String> = banks.iter().map(|b| b.key()).collect();
        keys.sort();
        keys.insert(0, NO_FORCED_BANK.to_string());
        Ok(keys)
    }
}
