//! The fixed feature schema consumed by the price model.

use serde::{Deserialize, Serialize};

use crate::error::FeatureError;

pub const NUM_FEATURES: usize = 8;

/// Feature names in the order the model expects them.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "MedInc",
    "HouseAge",
    "AveRooms",
    "AveBedrms",
    "Population",
    "AveOccup",
    "Latitude",
    "Longitude",
];

/// One row of model input.
///
/// Every field defaults to zero. No range checks are applied, so a
/// latitude of 0.0 or a negative room count is passed to the model as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HousingFeatures {
    #[serde(rename = "MedInc", default)]
    pub med_inc: f64,
    #[serde(rename = "HouseAge", default)]
    pub house_age: f64,
    #[serde(rename = "AveRooms", default)]
    pub ave_rooms: f64,
    #[serde(rename = "AveBedrms", default)]
    pub ave_bedrms: f64,
    #[serde(rename = "Population", default)]
    pub population: f64,
    #[serde(rename = "AveOccup", default)]
    pub ave_occup: f64,
    #[serde(rename = "Latitude", default)]
    pub latitude: f64,
    #[serde(rename = "Longitude", default)]
    pub longitude: f64,
}

impl HousingFeatures {
    /// Values in [`FEATURE_NAMES`] order.
    pub fn to_array(&self) -> [f64; NUM_FEATURES] {
        [
            self.med_inc,
            self.house_age,
            self.ave_rooms,
            self.ave_bedrms,
            self.population,
            self.ave_occup,
            self.latitude,
            self.longitude,
        ]
    }

    pub fn from_array(values: [f64; NUM_FEATURES]) -> Self {
        let [med_inc, house_age, ave_rooms, ave_bedrms, population, ave_occup, latitude, longitude] =
            values;
        Self {
            med_inc,
            house_age,
            ave_rooms,
            ave_bedrms,
            population,
            ave_occup,
            latitude,
            longitude,
        }
    }

    /// Builds a feature vector from named values given in any order.
    ///
    /// Names missing from `pairs` stay at zero.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, FeatureError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut values = [0.0; NUM_FEATURES];
        let mut seen = [false; NUM_FEATURES];

        for (name, value) in pairs {
            let idx = feature_index(name)
                .ok_or_else(|| FeatureError::UnknownFeature(name.to_string()))?;
            if seen[idx] {
                return Err(FeatureError::DuplicateFeature(name.to_string()));
            }
            seen[idx] = true;
            values[idx] = value;
        }

        Ok(Self::from_array(values))
    }
}

pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|&n| n == name)
}

/// Raw text as submitted by the prediction form.
///
/// Fields arrive as strings so that a blank entry can be told apart from
/// text that is not a number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureForm {
    #[serde(rename = "MedInc", default)]
    pub med_inc: Option<String>,
    #[serde(rename = "HouseAge", default)]
    pub house_age: Option<String>,
    #[serde(rename = "AveRooms", default)]
    pub ave_rooms: Option<String>,
    #[serde(rename = "AveBedrms", default)]
    pub ave_bedrms: Option<String>,
    #[serde(rename = "Population", default)]
    pub population: Option<String>,
    #[serde(rename = "AveOccup", default)]
    pub ave_occup: Option<String>,
    #[serde(rename = "Latitude", default)]
    pub latitude: Option<String>,
    #[serde(rename = "Longitude", default)]
    pub longitude: Option<String>,
}

impl FeatureForm {
    fn fields(&self) -> [&Option<String>; NUM_FEATURES] {
        [
            &self.med_inc,
            &self.house_age,
            &self.ave_rooms,
            &self.ave_bedrms,
            &self.population,
            &self.ave_occup,
            &self.latitude,
            &self.longitude,
        ]
    }

    /// Parses every field, treating blank or absent entries as zero.
    pub fn parse(&self) -> Result<HousingFeatures, FeatureError> {
        let mut values = [0.0; NUM_FEATURES];
        for (idx, field) in self.fields().into_iter().enumerate() {
            values[idx] = parse_field(FEATURE_NAMES[idx], field.as_deref())?;
        }
        Ok(HousingFeatures::from_array(values))
    }

    /// Submitted text per feature, for echoing back into the form.
    pub fn raw_values(&self) -> [String; NUM_FEATURES] {
        self.fields()
            .map(|field| field.as_deref().unwrap_or_default().trim().to_string())
    }
}

fn parse_field(feature: &str, raw: Option<&str>) -> Result<f64, FeatureError> {
    let text = raw.map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Ok(0.0);
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(FeatureError::NotNumeric {
            feature: feature.to_string(),
            value: text.to_string(),
        }),
    }
}
