use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(RecordId);
id_newtype!(StaffId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Equipment,
    Box,
    Hospital,
    Trip,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Equipment,
        EntityKind::Box,
        EntityKind::Hospital,
        EntityKind::Trip,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            EntityKind::Equipment => "equipment",
            EntityKind::Box => "box",
            EntityKind::Hospital => "hospital",
            EntityKind::Trip => "trip",
        }
    }

    pub fn schema(self) -> &'static EntitySchema {
        match self {
            EntityKind::Equipment => &EQUIPMENT,
            EntityKind::Box => &BOX,
            EntityKind::Hospital => &HOSPITAL,
            EntityKind::Trip => &TRIP,
        }
    }

    /// Path of the Search-and-List view every successful submit redirects to.
    pub fn redirect_target(self) -> String {
        format!("/{}/search", self.slug())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown entity '{0}'")]
pub struct UnknownEntity(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntity;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == raw)
            .ok_or_else(|| UnknownEntity(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text { max_len: usize },
    Integer { min: i64 },
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    const fn text(name: &'static str, label: &'static str, max_len: usize, required: bool) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Text { max_len },
            required,
        }
    }

    const fn reference(name: &'static str, label: &'static str, required: bool) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Integer { min: 1 },
            required,
        }
    }

    const fn date(name: &'static str, label: &'static str, required: bool) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Date,
            required,
        }
    }
}

/// Everything the generic list/create/edit workflow needs to know about one
/// entity: where it is stored, what its form looks like and how it is found.
#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub table: &'static str,
    pub fields: &'static [FieldSpec],
    pub search_field: Option<&'static str>,
    pub list_template: &'static str,
    pub form_template: &'static str,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.name)
    }
}

static EQUIPMENT: EntitySchema = EntitySchema {
    kind: EntityKind::Equipment,
    table: "equipment",
    fields: &[
        FieldSpec::text("name", "Name", 100, true),
        FieldSpec::text("serial_number", "Serial number", 50, false),
        FieldSpec::text("description", "Description", 500, false),
    ],
    search_field: Some("name"),
    list_template: "equipment/search.html",
    form_template: "equipment/form.html",
};

static BOX: EntitySchema = EntitySchema {
    kind: EntityKind::Box,
    table: "boxes",
    fields: &[
        FieldSpec::text("label", "Label", 50, true),
        FieldSpec::reference("equipment_id", "Equipment", false),
        FieldSpec::text("additional_info", "Additional information", 255, false),
    ],
    search_field: Some("additional_info"),
    list_template: "box/search.html",
    form_template: "box/form.html",
};

static HOSPITAL: EntitySchema = EntitySchema {
    kind: EntityKind::Hospital,
    table: "hospitals",
    fields: &[
        FieldSpec::text("name", "Name", 100, true),
        FieldSpec::text("city", "City", 100, false),
    ],
    search_field: Some("name"),
    list_template: "hospital/search.html",
    form_template: "hospital/form.html",
};

static TRIP: EntitySchema = EntitySchema {
    kind: EntityKind::Trip,
    table: "trips",
    fields: &[
        FieldSpec::reference("origin_hospital_id", "Origin hospital", true),
        FieldSpec::reference("destination_hospital_id", "Destination hospital", true),
        FieldSpec::reference("box_id", "Box", false),
        FieldSpec::date("departure_date", "Departure date", true),
        FieldSpec::text("notes", "Notes", 500, false),
    ],
    search_field: None,
    list_template: "trip/search.html",
    form_template: "trip/form.html",
};
