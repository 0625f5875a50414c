use clap::{Parser, Subcommand};
use sea_orm::{ConnectionTrait, DatabaseConnection, JsonValue, Statement};
use std::fs;
use std::path::PathBuf;

use simplrh::config::Config;
use simplrh::database;
use simplrh::services::{
    documents::{self, SyncOutcome},
    invoice_status,
    payroll_export::{self, PayrollDialect, PayrollPeriod},
};

// Определяем структуру команд CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, verbatim_doc_comment)]
/// Утилита командной строки для администрирования SimplRH.
/// Просмотр данных, плановые задачи по счетам, выгрузка для бухгалтерии и шаблоны документов.
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Работа с базой данных.
    Db {
        #[command(subcommand)]
        db_command: DbCommand,
    },
    /// Операции со счетами.
    Invoices {
        #[command(subcommand)]
        invoices_command: InvoicesCommand,
    },
    /// Выгрузка отсутствий для расчёта зарплаты.
    Payroll {
        #[command(subcommand)]
        payroll_command: PayrollCommand,
    },
    /// Шаблоны юридических документов.
    Templates {
        #[command(subcommand)]
        templates_command: TemplatesCommand,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommand {
    /// Выполняет SELECT-запрос к указанной таблице и выводит результат в формате JSON.
    Query {
        /// Имя таблицы для запроса.
        #[arg(short, long)]
        table: String,

        /// Условие WHERE для фильтрации (например, "organization_id = 1").
        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum InvoicesCommand {
    /// Переводит неоплаченные `sent` счета с истёкшим сроком в `overdue`.
    MarkOverdue {
        /// Только для одной организации.
        #[arg(long)]
        org: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum PayrollCommand {
    /// CSV с одобренными отсутствиями за месяц.
    Export {
        /// ID организации.
        #[arg(long)]
        org: i64,

        /// `silae` или `payfit`.
        #[arg(long)]
        dialect: String,

        /// Месяц в формате YYYY-MM.
        #[arg(long)]
        month: String,

        /// Файл для записи. Без него CSV печатается в stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum TemplatesCommand {
    /// Записывает встроенные шаблоны в doc_templates.
    Sync,
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

async fn query_table(
    db: &DatabaseConnection,
    table: &str,
    filter: Option<&str>,
) -> Result<Vec<JsonValue>, Box<dyn std::error::Error>> {
    if !is_identifier(table) {
        return Err(format!("Недопустимое имя таблицы: {}", table).into());
    }
    // Postgres сам собирает строку в JSON, типы колонок не важны
    let mut inner = format!("SELECT * FROM \"{}\"", table);
    if let Some(f) = filter {
        inner.push_str(" WHERE ");
        inner.push_str(f);
    }
    let query_str = format!("SELECT row_to_json(t) AS row FROM ({}) t", inner);

    println!("Выполнение запроса: {}", inner);
    let rows = db
        .query_all(Statement::from_string(db.get_database_backend(), query_str))
        .await?;

    let mut json_rows = Vec::with_capacity(rows.len());
    for row in rows {
        json_rows.push(row.try_get::<JsonValue>("", "row")?);
    }
    Ok(json_rows)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let config = Config::from_env()?;
    let cli = Cli::parse();
    let db = database::connect().await?;

    match &cli.command {
        Commands::Db { db_command } => match db_command {
            DbCommand::Query { table, filter } => {
                let rows = query_table(&db, table, filter.as_deref()).await?;
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
        },
        Commands::Invoices { invoices_command } => match invoices_command {
            InvoicesCommand::MarkOverdue { org } => {
                let today = config.today();
                let updated = invoice_status::mark_overdue(&db, *org, today).await?;
                println!("Просрочено счетов на {}: {}", today, updated);
            }
        },
        Commands::Payroll { payroll_command } => match payroll_command {
            PayrollCommand::Export {
                org,
                dialect,
                month,
                out,
            } => {
                let dialect: PayrollDialect = dialect.parse()?;
                let period = PayrollPeriod::parse_month(month)?;
                let csv = payroll_export::export(&db, *org, dialect, &period).await?;
                match out {
                    Some(path) => {
                        fs::write(path, &csv)?;
                        println!("Записано {} байт в {}", csv.len(), path.display());
                    }
                    None => print!("{}", String::from_utf8_lossy(&csv)),
                }
            }
        },
        Commands::Templates { templates_command } => match templates_command {
            TemplatesCommand::Sync => {
                for (kind, outcome) in documents::sync_templates(&db).await? {
                    let status = match outcome {
                        SyncOutcome::Created => "создан (v1)".to_string(),
                        SyncOutcome::Updated { version } => format!("обновлён (v{})", version),
                        SyncOutcome::Unchanged { version } => format!("без изменений (v{})", version),
                    };
                    println!("{}: {}", kind.key(), status);
                }
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_payroll_export_arguments() {
        let cli = Cli::try_parse_from([
            "admin-cli", "payroll", "export", "--org", "3", "--dialect", "silae", "--month",
            "2026-03",
        ])
        .unwrap();
        match cli.command {
            Commands::Payroll {
                payroll_command: PayrollCommand::Export { org, dialect, month, out },
            } => {
                assert_eq!(org, 3);
                assert_eq!(dialect, "silae");
                assert_eq!(month, "2026-03");
                assert!(out.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rejects_table_names_with_sql() {
        assert!(is_identifier("invoices"));
        assert!(!is_identifier("invoices; DROP TABLE x"));
        assert!(!is_identifier(""));
    }
}
