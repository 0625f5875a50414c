use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// --- Organizations (tenants) ---
pub mod organizations {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
    #[schema(as = Organization)]
    #[sea_orm(table_name = "organizations")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        pub legal_form: Option<String>,
        pub siret: Option<String>,
        pub vat_number: Option<String>,
        pub address: Option<String>,
        pub postal_code: Option<String>,
        pub city: Option<String>,
        pub email: String,
        pub phone: Option<String>,
        pub iban: Option<String>,
        pub invoice_prefix: String,
        pub payment_terms_days: i32,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
        #[schema(value_type = String, format = DateTime)]
        pub updated_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::customers::Entity")]
        Customers,
        #[sea_orm(has_many = "super::invoices::Entity")]
        Invoices,
        #[sea_orm(has_many = "super::employees::Entity")]
        Employees,
    }

    impl Related<super::customers::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Customers.def()
        }
    }

    impl Related<super::invoices::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Invoices.def()
        }
    }

    impl Related<super::employees::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Employees.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}

    impl Model {
        /// Однострочный адрес для документов
        pub fn full_address(&self) -> String {
            join_address(
                self.address.as_deref(),
                self.postal_code.as_deref(),
                self.city.as_deref(),
            )
        }
    }
}

// --- Customers ---
pub mod customers {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
    #[schema(as = Customer)]
    #[sea_orm(table_name = "customers")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub organization_id: i64,
        pub name: String,
        pub email: String,
        pub address: Option<String>,
        pub postal_code: Option<String>,
        pub city: Option<String>,
        pub siret: Option<String>,
        pub vat_number: Option<String>,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::organizations::Entity",
            from = "Column::OrganizationId",
            to = "super::organizations::Column::Id"
        )]
        Organization,
        #[sea_orm(has_many = "super::invoices::Entity")]
        Invoices,
    }

    impl Related<super::organizations::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Organization.def()
        }
    }

    impl Related<super::invoices::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Invoices.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}

    impl Model {
        pub fn full_address(&self) -> String {
            join_address(
                self.address.as_deref(),
                self.postal_code.as_deref(),
                self.city.as_deref(),
            )
        }
    }
}

// --- Invoices ---
pub mod invoices {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
    #[schema(as = Invoice)]
    #[sea_orm(table_name = "invoices")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub organization_id: i64,
        pub customer_id: i64,
        pub number: String,
        pub status: String,
        pub issue_date: Date,
        pub due_date: Date,
        #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
        pub total_ht: Decimal,
        #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
        pub total_vat: Decimal,
        #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
        pub total_ttc: Decimal,
        pub notes: Option<String>,
        #[schema(value_type = String, format = DateTime)]
        pub sent_at: Option<DateTimeUtc>,
        #[schema(value_type = String, format = DateTime)]
        pub paid_at: Option<DateTimeUtc>,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
        #[schema(value_type = String, format = DateTime)]
        pub updated_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::organizations::Entity",
            from = "Column::OrganizationId",
            to = "super::organizations::Column::Id"
        )]
        Organization,
        #[sea_orm(
            belongs_to = "super::customers::Entity",
            from = "Column::CustomerId",
            to = "super::customers::Column::Id"
        )]
        Customer,
        #[sea_orm(has_many = "super::invoice_items::Entity")]
        Items,
        #[sea_orm(has_many = "super::payments::Entity")]
        Payments,
    }

    impl Related<super::organizations::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Organization.def()
        }
    }

    impl Related<super::customers::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Customer.def()
        }
    }

    impl Related<super::invoice_items::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Items.def()
        }
    }

    impl Related<super::payments::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Payments.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Invoice Items ---
pub mod invoice_items {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
    #[schema(as = InvoiceItem)]
    #[sea_orm(table_name = "invoice_items")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub invoice_id: i64,
        pub position: i32,
        pub label: String,
        #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
        pub quantity: Decimal,
        #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
        pub unit_price: Decimal,
        #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
        pub vat_rate: Decimal,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::invoices::Entity",
            from = "Column::InvoiceId",
            to = "super::invoices::Column::Id",
            on_delete = "Cascade"
        )]
        Invoice,
    }

    impl Related<super::invoices::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Invoice.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Payments ---
pub mod payments {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
    #[schema(as = Payment)]
    #[sea_orm(table_name = "payments")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub organization_id: i64,
        pub invoice_id: i64,
        #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
        pub amount: Decimal,
        pub method: String,
        pub paid_at: Date,
        pub reference: Option<String>,
        #[sea_orm(unique)]
        pub external_id: Option<String>,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::invoices::Entity",
            from = "Column::InvoiceId",
            to = "super::invoices::Column::Id"
        )]
        Invoice,
    }

    impl Related<super::invoices::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Invoice.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Employees ---
pub mod employees {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
    #[schema(as = Employee)]
    #[sea_orm(table_name = "employees")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub organization_id: i64,
        pub registration_number: String,
        pub first_name: String,
        pub last_name: String,
        pub email: String,
        pub job_title: Option<String>,
        pub hire_date: Date,
        pub manager_email: Option<String>,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::organizations::Entity",
            from = "Column::OrganizationId",
            to = "super::organizations::Column::Id"
        )]
        Organization,
        #[sea_orm(has_many = "super::absences::Entity")]
        Absences,
        #[sea_orm(has_many = "super::leave_requests::Entity")]
        LeaveRequests,
    }

    impl Related<super::organizations::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Organization.def()
        }
    }

    impl Related<super::absences::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Absences.def()
        }
    }

    impl Related<super::leave_requests::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::LeaveRequests.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}

    impl Model {
        pub fn full_name(&self) -> String {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

// --- Absences ---
pub mod absences {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
    #[schema(as = Absence)]
    #[sea_orm(table_name = "absences")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub organization_id: i64,
        pub employee_id: i64,
        pub kind: String,
        pub start_date: Date,
        pub end_date: Date,
        pub status: String,
        pub comment: Option<String>,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::employees::Entity",
            from = "Column::EmployeeId",
            to = "super::employees::Column::Id",
            on_delete = "Cascade"
        )]
        Employee,
    }

    impl Related<super::employees::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Employee.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Leave Requests ---
pub mod leave_requests {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
    #[schema(as = LeaveRequest)]
    #[sea_orm(table_name = "leave_requests")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub organization_id: i64,
        pub employee_id: i64,
        pub kind: String,
        pub start_date: Date,
        pub end_date: Date,
        pub reason: Option<String>,
        pub status: String,
        #[schema(value_type = String, format = DateTime)]
        pub decided_at: Option<DateTimeUtc>,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::employees::Entity",
            from = "Column::EmployeeId",
            to = "super::employees::Column::Id",
            on_delete = "Cascade"
        )]
        Employee,
    }

    impl Related<super::employees::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Employee.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Document Templates ---
pub mod doc_templates {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
    #[schema(as = DocTemplate)]
    #[sea_orm(table_name = "doc_templates")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        #[sea_orm(unique)]
        pub key: String,
        pub title: String,
        pub description: Option<String>,
        #[sea_orm(column_type = "JsonBinary")]
        #[schema(value_type = Object)]
        pub schema: Json,
        pub version: i32,
        #[schema(value_type = String, format = DateTime)]
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Document Requests ---
pub mod doc_requests {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
    #[schema(as = DocRequest)]
    #[sea_orm(table_name = "doc_requests")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub organization_id: i64,
        pub template_key: String,
        pub template_version: i32,
        #[sea_orm(column_type = "JsonBinary")]
        #[schema(value_type = Object)]
        pub payload: Json,
        pub status: String,
        pub error: Option<String>,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::doc_files::Entity")]
        Files,
    }

    impl Related<super::doc_files::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Files.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Document Files ---
pub mod doc_files {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
    #[schema(as = DocFile)]
    #[sea_orm(table_name = "doc_files")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub organization_id: i64,
        pub request_id: i64,
        pub file_name: String,
        #[serde(skip_serializing)]
        pub storage_path: String,
        pub mime_type: String,
        pub size_bytes: i64,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::doc_requests::Entity",
            from = "Column::RequestId",
            to = "super::doc_requests::Column::Id"
        )]
        Request,
    }

    impl Related<super::doc_requests::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Request.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

fn join_address(address: Option<&str>, postal_code: Option<&str>, city: Option<&str>) -> String {
    let locality = [postal_code, city]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    [address.map(str::trim).unwrap_or(""), locality.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_partial_addresses() {
        assert_eq!(
            join_address(Some("12 rue de la Paix"), Some("75002"), Some("Paris")),
            "12 rue de la Paix, 75002 Paris"
        );
        assert_eq!(join_address(None, Some("69001"), Some("Lyon")), "69001 Lyon");
        assert_eq!(join_address(None, None, None), "");
    }
}
