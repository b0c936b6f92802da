//! Map plot assembly
//!
//! Turns the stored case and vaccination rows into two marker layers over a
//! projection, either the whole world or one country's viewport. Drawing the
//! result is left to the UI.

use rusqlite::OptionalExtension;
use tracing::debug;

use crate::data::cases::CASES_TABLE;
use crate::data::locations::LOCATIONS_TABLE;
use crate::data::store::numeric;
use crate::data::vaccinations::VACCINATIONS_TABLE;
use crate::data::{GeoStore, StoreError, Viewport};

/// Marker size multipliers for one kind of view
#[derive(Debug, Clone, Copy, PartialEq)]
struct MarkerScale {
    /// Confirmed cases per unit of marker size
    cases_per_unit: f64,
    /// Marker size per dose per hundred people
    units_per_vaccination_rate: f64,
}

const WORLD_SCALE: MarkerScale = MarkerScale {
    cases_per_unit: 10_000.0,
    units_per_vaccination_rate: 5.0,
};

/// Scale for views zoomed to one country
const REGIONAL_SCALE: MarkerScale = MarkerScale {
    cases_per_unit: 1_000.0,
    units_per_vaccination_rate: 50.0,
};

/// Figure width, in marker size units, that the full longitude range maps onto
const FIGURE_WIDTH: f64 = 720.0;

/// What to show on the map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    World,
    Country(String),
}

impl Selection {
    /// Interprets user input: `world` (any case) or a country name
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.eq_ignore_ascii_case("world") {
            Selection::World
        } else {
            Selection::Country(input.to_string())
        }
    }
}

/// Map projection for a plot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Whole-world view
    Global,
    /// View clipped to a country's viewport
    Regional(Viewport),
}

impl Projection {
    /// Longitude range shown
    ///
    /// A viewport that crosses the antimeridian (south-west longitude east of
    /// the north-east one) is clipped to whichever side of the line is wider.
    pub fn x_bounds(&self) -> [f64; 2] {
        match self {
            Projection::Global => [-180.0, 180.0],
            Projection::Regional(viewport) if viewport.sw_lng > viewport.ne_lng => {
                let east = 180.0 - viewport.sw_lng;
                let west = viewport.ne_lng + 180.0;
                if east >= west {
                    [viewport.sw_lng, 180.0]
                } else {
                    [-180.0, viewport.ne_lng]
                }
            }
            Projection::Regional(viewport) => [viewport.sw_lng, viewport.ne_lng],
        }
    }

    /// Latitude range shown
    pub fn y_bounds(&self) -> [f64; 2] {
        match self {
            Projection::Global => [-90.0, 90.0],
            Projection::Regional(viewport) => [
                viewport.sw_lat.min(viewport.ne_lat),
                viewport.sw_lat.max(viewport.ne_lat),
            ],
        }
    }

    pub fn is_regional(&self) -> bool {
        matches!(self, Projection::Regional(_))
    }

    fn scale(&self) -> MarkerScale {
        match self {
            Projection::Global => WORLD_SCALE,
            Projection::Regional(_) => REGIONAL_SCALE,
        }
    }
}

/// One scatter point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub lat: f64,
    pub lng: f64,
    /// Marker area in figure units
    pub size: f64,
}

impl Marker {
    /// Radius in degrees when `span` degrees of longitude fill the figure
    pub fn radius(&self, span: f64) -> f64 {
        self.size.max(0.0).sqrt() / 2.0 * span / FIGURE_WIDTH
    }
}

/// Everything needed to draw one map
#[derive(Debug, Clone, PartialEq)]
pub struct MapPlot {
    pub title: String,
    pub projection: Projection,
    /// Confirmed case layer
    pub cases: Vec<Marker>,
    /// Peak vaccination rate layer
    pub vaccinations: Vec<Marker>,
}

/// Result of rendering a selection
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Rendered(MapPlot),
    /// The country is unknown or its viewport is incomplete
    NotFound,
}

/// Builds map plots from the relational store
pub struct Renderer<'a> {
    store: &'a GeoStore,
}

impl<'a> Renderer<'a> {
    pub fn new(store: &'a GeoStore) -> Self {
        Self { store }
    }

    /// Builds the plot for `selection`
    ///
    /// # Returns
    /// * `Ok(RenderOutcome::Rendered)` with both marker layers
    /// * `Ok(RenderOutcome::NotFound)` if a country has no complete viewport
    /// * `Err(StoreError)` if the store cannot be queried
    pub fn render(&self, selection: &Selection) -> Result<RenderOutcome, StoreError> {
        match selection {
            Selection::World => self.render_world().map(RenderOutcome::Rendered),
            Selection::Country(country) => match self.viewport(country)? {
                Some(viewport) => self
                    .plot(Projection::Regional(viewport), country.clone())
                    .map(RenderOutcome::Rendered),
                None => {
                    debug!(country = %country, "no viewport for country");
                    Ok(RenderOutcome::NotFound)
                }
            },
        }
    }

    /// Builds the whole-world plot
    pub fn render_world(&self) -> Result<MapPlot, StoreError> {
        self.plot(Projection::Global, "World".to_string())
    }

    fn plot(&self, projection: Projection, title: String) -> Result<MapPlot, StoreError> {
        let scale = projection.scale();
        let cases = self
            .case_points()?
            .into_iter()
            .map(|(lat, lng, count)| Marker {
                lat,
                lng,
                size: count / scale.cases_per_unit,
            })
            .collect();
        let vaccinations = self
            .peak_vaccination_points()?
            .into_iter()
            .map(|(lat, lng, rate)| Marker {
                lat,
                lng,
                size: rate * scale.units_per_vaccination_rate,
            })
            .collect();

        Ok(MapPlot {
            title,
            projection,
            cases,
            vaccinations,
        })
    }

    /// Viewport of `country`, if stored with four numeric bounds
    fn viewport(&self, country: &str) -> Result<Option<Viewport>, StoreError> {
        if !self.store.has_table(LOCATIONS_TABLE)? {
            return Ok(None);
        }

        let bounds = self
            .store
            .conn()
            .query_row(
                "SELECT view_ne_lat, view_ne_lng, view_sw_lat, view_sw_lng
                 FROM Locations WHERE country = ?1",
                [country],
                |row| {
                    Ok([
                        numeric(row.get_ref(0)?),
                        numeric(row.get_ref(1)?),
                        numeric(row.get_ref(2)?),
                        numeric(row.get_ref(3)?),
                    ])
                },
            )
            .optional()?;

        Ok(match bounds {
            Some([Some(ne_lat), Some(ne_lng), Some(sw_lat), Some(sw_lng)]) => Some(Viewport {
                ne_lat,
                ne_lng,
                sw_lat,
                sw_lng,
            }),
            _ => None,
        })
    }

    /// `(lat, lng, confirmed)` for every case row with numeric coordinates
    fn case_points(&self) -> Result<Vec<(f64, f64, f64)>, StoreError> {
        if !self.store.has_table(CASES_TABLE)? {
            return Ok(Vec::new());
        }

        let mut stmt = self
            .store
            .conn()
            .prepare("SELECT Lat, Long, confirmed_cases FROM covid_cases ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                numeric(row.get_ref(0)?),
                numeric(row.get_ref(1)?),
                numeric(row.get_ref(2)?),
            ))
        })?;

        let mut points = Vec::new();
        for row in rows {
            if let (Some(lat), Some(lng), count) = row? {
                points.push((lat, lng, count.unwrap_or(0.0)));
            }
        }
        Ok(points)
    }

    /// `(lat, lng, rate)` at each country's centre for its highest
    /// per-hundred vaccination rate
    fn peak_vaccination_points(&self) -> Result<Vec<(f64, f64, f64)>, StoreError> {
        if !self.store.has_table(VACCINATIONS_TABLE)? || !self.store.has_table(LOCATIONS_TABLE)? {
            return Ok(Vec::new());
        }

        // SQLite takes the bare columns from the row that holds the MAX
        let mut stmt = self.store.conn().prepare(
            "SELECT l.lat, l.lng, v.vac_num, MAX(v.vac_per_hundred)
             FROM Vaccinations v JOIN Locations l ON v.location_id = l.id
             WHERE v.vac_per_hundred IS NOT NULL
             GROUP BY v.location_id
             ORDER BY v.location_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                numeric(row.get_ref(0)?),
                numeric(row.get_ref(1)?),
                numeric(row.get_ref(2)?),
                numeric(row.get_ref(3)?),
            ))
        })?;

        let mut points = Vec::new();
        for row in rows {
            if let (Some(lat), Some(lng), Some(_total), Some(rate)) = row? {
                points.push((lat, lng, rate));
            }
        }
        Ok(points)
    }
}
