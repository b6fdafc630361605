mod budget;
mod cli;
mod closure;
mod db;
mod dedup;
mod descriptor;
mod error;
mod fmt;
mod hr;
mod importer;
mod logging;
mod matcher;
mod models;
mod normalize;
mod parser;
mod reader;
mod registry;
mod settings;

use clap::Parser;

use cli::{
    AccountsCommands, BudgetCommands, Cli, ClientsCommands, ClosureCommands, Commands, ContractCommands,
    EntitiesCommands, EntriesCommands, FormatsCommands, HrCommands, ImportsCommands, PersonCommands,
};

fn main() {
    let cli = Cli::parse();
    let settings = settings::load_settings();
    logging::init(settings.log_level.as_deref());

    let explicit = cli.client.as_deref();
    let client = || settings.client(explicit);

    let result = match cli.command {
        Commands::Init {
            data_dir,
            default_client,
        } => cli::init::run(data_dir, default_client.or_else(|| cli.client.clone())),
        Commands::Clients { command } => match command {
            ClientsCommands::Add { name } => cli::entities::add_client(&settings, &name),
            ClientsCommands::List => cli::entities::list_clients(&settings),
        },
        Commands::Entities { command } => match command {
            EntitiesCommands::Add { name, code } => {
                client().and_then(|c| cli::entities::add(&settings, c, &name, code.as_deref()))
            }
            EntitiesCommands::List => cli::entities::list(&settings, explicit),
        },
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                label,
                iban,
                number,
                bank,
                entity,
            } => client().and_then(|c| {
                cli::accounts::add(
                    &settings,
                    &registry::NewBankAccount {
                        client: c,
                        label: &label,
                        entity: entity.as_deref(),
                        bank_name: bank.as_deref(),
                        iban: iban.as_deref(),
                        account_number: number.as_deref(),
                    },
                )
            }),
            AccountsCommands::List => client().and_then(|c| cli::accounts::list(&settings, c)),
            AccountsCommands::Delete { label } => client().and_then(|c| cli::accounts::delete(&settings, c, &label)),
        },
        Commands::Formats { command } => match command {
            FormatsCommands::Add {
                name,
                columns,
                delimiter,
                skip_rows,
                no_header,
                date_order,
                sheet,
            } => cli::formats::add(
                &settings,
                &registry::NewFormat {
                    name: &name,
                    descriptor: &columns,
                    delimiter,
                    skip_rows,
                    has_header: !no_header,
                    date_order,
                    sheet: sheet.as_deref(),
                },
            ),
            FormatsCommands::List => cli::formats::list(&settings),
            FormatsCommands::Show { name } => cli::formats::show(&settings, &name),
            FormatsCommands::Check { name, file, limit } => cli::formats::check(&settings, &name, &file, limit),
            FormatsCommands::Delete { name } => cli::formats::delete(&settings, &name),
        },
        Commands::Import { file, format, account } => {
            client().and_then(|c| cli::import::run(&settings, c, &file, &format, account.as_deref()))
        }
        Commands::Imports { command } => match command {
            ImportsCommands::List => cli::import::list(&settings, explicit.or(settings.default_client.as_deref())),
            ImportsCommands::Show { id, errors } => cli::import::show(&settings, id, errors),
            ImportsCommands::Reprocess { id } => cli::import::reprocess(&settings, id),
            ImportsCommands::Delete { id } => cli::import::delete(&settings, id),
        },
        Commands::Entries { command } => match command {
            EntriesCommands::List { account, month, limit } => client().and_then(|c| {
                cli::import::entries(
                    &settings,
                    &importer::EntryFilter {
                        client: c,
                        account: account.as_deref(),
                        month: month.as_deref(),
                        limit,
                    },
                )
            }),
        },
        Commands::Closure { command } => match command {
            ClosureCommands::Record {
                entity,
                date,
                modes,
                notes,
            } => client().and_then(|c| cli::closure::record(&settings, c, &entity, date, &modes, notes.as_deref())),
            ClosureCommands::Show { id, tolerance } => cli::closure::show(&settings, id, tolerance),
            ClosureCommands::List { entity, month } => {
                client().and_then(|c| cli::closure::list(&settings, c, &entity, month.as_deref()))
            }
            ClosureCommands::Delete { id } => cli::closure::delete(&settings, id),
        },
        Commands::Budget { command } => match command {
            BudgetCommands::Set {
                entity,
                year,
                month,
                category,
                amount,
                replace,
            } => client().and_then(|c| {
                cli::budget::set(
                    &settings,
                    &budget::BudgetLine {
                        client: c,
                        entity: &entity,
                        year,
                        month,
                        category: &category,
                        amount,
                    },
                    replace,
                )
            }),
            BudgetCommands::Show { entity, year } => client().and_then(|c| cli::budget::show(&settings, c, &entity, year)),
            BudgetCommands::Copy {
                entity,
                from,
                to,
                growth,
            } => client().and_then(|c| cli::budget::copy(&settings, c, &entity, from, to, growth)),
            BudgetCommands::Delete {
                entity,
                year,
                month,
                category,
            } => client().and_then(|c| cli::budget::delete(&settings, c, &entity, year, month, &category)),
        },
        Commands::Hr { command } => match command {
            HrCommands::Person { command } => match command {
                PersonCommands::Add {
                    last_name,
                    first_name,
                    title,
                } => client().and_then(|c| {
                    cli::hr::add_person(&settings, c, &last_name, &first_name, title.as_deref())
                }),
                PersonCommands::List => client().and_then(|c| cli::hr::list_people(&settings, c)),
            },
            HrCommands::Contract { command } => match command {
                ContractCommands::Add {
                    person,
                    contract_type,
                    start,
                    end,
                    gross,
                    employer_rate,
                    hours,
                } => cli::hr::add_contract(
                    &settings,
                    &hr::NewContract {
                        person_id: person,
                        contract_type: &contract_type,
                        start,
                        end,
                        monthly_gross: gross,
                        employer_rate,
                        weekly_hours: hours,
                    },
                ),
                ContractCommands::List { person } => cli::hr::list_contracts(&settings, person),
            },
            HrCommands::Assign {
                contract,
                entity,
                share,
                from,
                to,
            } => cli::hr::assign(
                &settings,
                &hr::NewAffectation {
                    contract_id: contract,
                    entity: &entity,
                    share_pct: share,
                    start: from,
                    end: to,
                },
            ),
            HrCommands::Project { year, entity } => {
                client().and_then(|c| cli::hr::project(&settings, c, year, entity.as_deref()))
            }
        },
        Commands::Backup { output } => cli::backup::run(&settings, output),
        Commands::Status => cli::status::run(&settings),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
