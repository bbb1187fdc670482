// crates/cityscope-core/src/model.rs

use serde::{Deserialize, Deserializer, Serialize};

/// Raw coordinate pair as it comes from JSON: `{"lon": .., "lat": ..}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CoordRaw {
    pub lon: f64,
    pub lat: f64,
}

/// Raw city structure as it comes from JSON.
///
/// ```json
/// {"country":"UA","name":"Hurzuf","_id":707860,"coord":{"lon":34.283333,"lat":44.549999}}
/// ```
///
/// The published dataset uses numeric ids; hand-written fixtures often use
/// strings. Both are accepted and normalized to a `String`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityRaw {
    #[serde(rename = "_id", deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub name: String,
    pub country: String,
    pub coord: CoordRaw,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcountry: Option<String>,
}

pub type CitiesRaw = Vec<CityRaw>;

fn id_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Unsigned(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    })
}

/// A city in the catalogue.
///
/// `is_favorite` and `distance` are derived per emission: the repository
/// fills them in from the favorites store and the last reference point, they
/// are never persisted with the city itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub state: Option<String>,
    pub subcountry: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub distance: Option<f64>,
}

impl City {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        country: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            country: country.into(),
            latitude,
            longitude,
            state: None,
            subcountry: None,
            is_favorite: false,
            distance: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"Name, State"` when a state is known, `"Name, CC"` otherwise.
    pub fn display_name(&self) -> String {
        match &self.state {
            Some(state) => format!("{}, {}", self.name, state),
            None => format!("{}, {}", self.name, self.country),
        }
    }

    /// Coordinates rendered with four decimals, latitude first.
    pub fn coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Copy of this city carrying the given favorite flag.
    pub fn with_favorite(&self, is_favorite: bool) -> Self {
        Self {
            is_favorite,
            ..self.clone()
        }
    }
}

impl From<CityRaw> for City {
    fn from(raw: CityRaw) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            country: raw.country,
            latitude: raw.coord.lat,
            longitude: raw.coord.lon,
            state: raw.state,
            subcountry: raw.subcountry,
            is_favorite: false,
            distance: None,
        }
    }
}

impl From<&City> for CityRaw {
    fn from(city: &City) -> Self {
        Self {
            id: city.id.clone(),
            name: city.name.clone(),
            country: city.country.clone(),
            coord: CoordRaw {
                lon: city.longitude,
                lat: city.latitude,
            },
            state: city.state.clone(),
            subcountry: city.subcountry.clone(),
        }
    }
}

/// Convert raw JSON records into domain cities.
pub fn build_cities(raw: CitiesRaw) -> Vec<City> {
    raw.into_iter().map(City::from).collect()
}

/// Decode the wire format (a JSON array of city objects) into domain cities.
pub fn decode_cities(bytes: &[u8]) -> crate::Result<Vec<City>> {
    let raw: CitiesRaw = serde_json::from_slice(bytes)?;
    Ok(build_cities(raw))
}

/// Encode cities back into the wire format. Derived fields are dropped.
pub fn encode_cities(cities: &[City]) -> crate::Result<Vec<u8>> {
    let raw: Vec<CityRaw> = cities.iter().map(CityRaw::from).collect();
    Ok(serde_json::to_vec(&raw)?)
}

/// Current weather for a coordinate pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    /// `"{lat}_{lon}"` of the request.
    pub city_id: String,
    /// Degrees Celsius.
    pub temperature: f64,
    pub description: String,
    /// Percent.
    pub humidity: i32,
    /// Meters per second.
    pub wind_speed: f64,
    pub icon: String,
    /// Unix millis at decode time.
    pub timestamp: i64,
}

/// A point on Earth, e.g. the user's position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}
