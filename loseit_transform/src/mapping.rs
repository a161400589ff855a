//! Maps LoseIt export rows onto the fixed curated schema.

use lazy_static::lazy_static;
use regex::Regex;

use crate::csv_rows::NormalizedRow;

pub const FOOD: &str = "food";
pub const EXERCISE: &str = "exercise";

lazy_static! {
    static ref NON_NUMERIC: Regex = Regex::new(r"[^0-9.\-]+").unwrap();
}

/// The curated columns, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    RecordType,
    Date,
    Meal,
    Name,
    Quantity,
    Units,
    Calories,
    ProteinG,
    FatG,
    CarbsG,
    FiberG,
    SodiumMg,
    SugarG,
    DurationMinutes,
    DistanceKm,
}

impl Column {
    pub const ALL: [Column; 15] = [
        Column::RecordType,
        Column::Date,
        Column::Meal,
        Column::Name,
        Column::Quantity,
        Column::Units,
        Column::Calories,
        Column::ProteinG,
        Column::FatG,
        Column::CarbsG,
        Column::FiberG,
        Column::SodiumMg,
        Column::SugarG,
        Column::DurationMinutes,
        Column::DistanceKm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::RecordType => "record_type",
            Column::Date => "date",
            Column::Meal => "meal",
            Column::Name => "name",
            Column::Quantity => "quantity",
            Column::Units => "units",
            Column::Calories => "calories",
            Column::ProteinG => "protein_g",
            Column::FatG => "fat_g",
            Column::CarbsG => "carbs_g",
            Column::FiberG => "fiber_g",
            Column::SodiumMg => "sodium_mg",
            Column::SugarG => "sugar_g",
            Column::DurationMinutes => "duration_minutes",
            Column::DistanceKm => "distance_km",
        }
    }

    /// Normalized source headers accepted for this column, most specific first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::RecordType => &["record_type", "type"],
            Column::Date => &["date"],
            Column::Meal => &["meal", "type"],
            Column::Name => &["name", "food", "exercise"],
            Column::Quantity => &["quantity", "amount"],
            Column::Units => &["units", "unit"],
            Column::Calories => &["calories", "kcal"],
            Column::ProteinG => &["protein_(g)", "protein"],
            Column::FatG => &["fat_(g)", "fat"],
            Column::CarbsG => &["carbohydrates_(g)", "carbs", "carbohydrates"],
            Column::FiberG => &["fiber_(g)", "fiber"],
            Column::SodiumMg => &["sodium_(mg)", "sodium"],
            Column::SugarG => &["sugars_(g)", "sugar"],
            Column::DurationMinutes => &["duration_minutes", "duration"],
            Column::DistanceKm => &["distance_km", "distance"],
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            Column::RecordType | Column::Date | Column::Meal | Column::Name | Column::Units
        )
    }

    /// Value of the first alias present in `row`. A present but empty cell
    /// still wins over later aliases.
    fn lookup(self, row: &NormalizedRow) -> Option<&str> {
        self.aliases()
            .iter()
            .find_map(|alias| row.get(*alias))
            .map(String::as_str)
    }

    fn text(self, row: &NormalizedRow) -> Option<String> {
        self.lookup(row)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn number(self, row: &NormalizedRow) -> Option<f64> {
        self.lookup(row).and_then(parse_number)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedRecord {
    pub record_type: String,
    pub date: Option<String>,
    pub meal: Option<String>,
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub units: Option<String>,
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub sugar_g: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub distance_km: Option<f64>,
}

impl TypedRecord {
    pub fn text(&self, column: Column) -> Option<&str> {
        match column {
            Column::RecordType => Some(self.record_type.as_str()),
            Column::Date => self.date.as_deref(),
            Column::Meal => self.meal.as_deref(),
            Column::Name => self.name.as_deref(),
            Column::Units => self.units.as_deref(),
            _ => None,
        }
    }

    pub fn number(&self, column: Column) -> Option<f64> {
        match column {
            Column::Quantity => self.quantity,
            Column::Calories => self.calories,
            Column::ProteinG => self.protein_g,
            Column::FatG => self.fat_g,
            Column::CarbsG => self.carbs_g,
            Column::FiberG => self.fiber_g,
            Column::SodiumMg => self.sodium_mg,
            Column::SugarG => self.sugar_g,
            Column::DurationMinutes => self.duration_minutes,
            Column::DistanceKm => self.distance_km,
            _ => None,
        }
    }
}

/// Recognized record type names map to their canonical spelling.
fn known_record_type(value: &str) -> Option<&'static str> {
    if value.eq_ignore_ascii_case(FOOD) {
        Some(FOOD)
    } else if value.eq_ignore_ascii_case(EXERCISE) {
        Some(EXERCISE)
    } else {
        None
    }
}

fn record_type(row: &NormalizedRow) -> &'static str {
    if let Some(explicit) = Column::RecordType.lookup(row).and_then(known_record_type) {
        return explicit;
    }
    let type_is_exercise = row
        .get("type")
        .map_or(false, |t| t.eq_ignore_ascii_case("exercise"));
    let name_mentions_exercise = Column::Name
        .lookup(row)
        .map_or(false, |n| n.to_lowercase().contains(EXERCISE));
    if type_is_exercise || name_mentions_exercise {
        EXERCISE
    } else {
        FOOD
    }
}

/// LoseIt puts the meal ("Breakfast", "Snacks", ...) in its `Type` column.
fn meal(row: &NormalizedRow, record_type: &str) -> Option<String> {
    if record_type == EXERCISE {
        return None;
    }
    Column::Meal
        .text(row)
        .filter(|m| known_record_type(m).is_none())
}

pub fn map_row(row: &NormalizedRow) -> TypedRecord {
    let record_type = record_type(row);
    TypedRecord {
        record_type: record_type.to_string(),
        date: Column::Date.text(row),
        meal: meal(row, record_type),
        name: Column::Name.text(row),
        quantity: Column::Quantity.number(row),
        units: Column::Units.text(row),
        calories: Column::Calories.number(row),
        protein_g: Column::ProteinG.number(row),
        fat_g: Column::FatG.number(row),
        carbs_g: Column::CarbsG.number(row),
        fiber_g: Column::FiberG.number(row),
        sodium_mg: Column::SodiumMg.number(row),
        sugar_g: Column::SugarG.number(row),
        duration_minutes: Column::DurationMinutes.number(row),
        distance_km: Column::DistanceKm.number(row),
    }
}

/// Drops everything but digits, `.` and `-`, then parses. Nothing left or an
/// unparsable remainder is `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = NON_NUMERIC.replace_all(raw, "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}
