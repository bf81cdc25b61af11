// CloudBooks - Digital Book Storefront
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use cloudbooks_core::shell::{self, Screen, Tab};
use cloudbooks_core::storage::Database;
use cloudbooks_core::{
    Book, Catalog, GenreFilter, RemoteBackend, SessionContext, StoreConfig, UploadField, UploadForm,
    UploadOutcome, ViewOutcome,
};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "cloudbooks-cli")]
#[command(about = "CloudBooks CLI - browse, buy and read digital books", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    SignIn {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "CLOUDBOOKS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    SignUp {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "CLOUDBOOKS_PASSWORD", hide_env_values = true)]
        password: String,
        /// Display name
        #[arg(short, long)]
        full_name: Option<String>,
    },
    /// Sign out and forget the stored session
    SignOut,
    /// Show the signed-in profile
    Whoami,
    /// Browse the store
    Books {
        /// Match title or author (case-insensitive)
        #[arg(short, long, default_value = "")]
        search: String,
        /// Exact genre, or "all"
        #[arg(short, long)]
        genre: Option<String>,
    },
    /// List the genres present in the catalog
    Genres,
    /// List the books you own
    Library,
    /// Buy a book
    Buy {
        book_id: Uuid,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the content link of a book
    Read { book_id: Uuid },
    /// Add a book to the catalog (authors and admins)
    Upload {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        price: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        genre: String,
        #[arg(long, default_value = "")]
        cover_url: String,
        #[arg(long, default_value = "")]
        file_url: String,
        /// YYYY-MM-DD
        #[arg(long, default_value = "")]
        published_date: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --verbose wins over RUST_LOG
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = StoreConfig::from_env().context("loading configuration")?;
    if config.database_path.is_none() {
        config.database_path = Some(Database::get_default_path());
    }

    let backend = Arc::new(RemoteBackend::connect(config).await?);
    let session = SessionContext::initialize(backend.clone(), backend.clone()).await;

    let result = run(cli.command, &session, backend).await;
    session.teardown().await;
    result
}

async fn run(command: Commands, session: &SessionContext, backend: Arc<RemoteBackend>) -> anyhow::Result<()> {
    match command {
        Commands::SignIn { email, password } => {
            let state = session
                .sign_in(&email, &password)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            match state.profile {
                Some(profile) => println!("Signed in as {} ({})", profile.display_name(), profile.role.as_str()),
                None => println!("Signed in as {}", email),
            }
        }
        Commands::SignUp { email, password, full_name } => {
            match session
                .sign_up(&email, &password, full_name.as_deref())
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?
            {
                Some(_) => println!("Account created, signed in as {}", email),
                None => println!("Account created. Check your email to confirm it, then sign in."),
            }
        }
        Commands::SignOut => {
            session.sign_out().await?;
            println!("Signed out");
        }
        Commands::Whoami => match session.profile() {
            Some(profile) => {
                println!("{} <{}>", profile.display_name(), profile.email);
                println!("Role: {}", profile.role.as_str());
            }
            None if session.user().is_some() => println!("Signed in (profile unavailable)"),
            None => println!("Not signed in"),
        },
        command => {
            if shell::route(&session.snapshot()) != Screen::Storefront {
                bail!("Not signed in. Run `cloudbooks-cli sign-in` first.");
            }
            let mut catalog = Catalog::new(backend, session.profile());
            catalog.refresh().await;
            storefront(command, &mut catalog).await?;
        }
    }
    Ok(())
}

async fn storefront(command: Commands, catalog: &mut Catalog) -> anyhow::Result<()> {
    match command {
        Commands::Books { search, genre } => {
            catalog.set_search(search);
            catalog.set_genre_filter(GenreFilter::from_option(genre.as_deref()));
            let books = catalog.filtered_books();
            if books.is_empty() {
                println!("No books found");
            }
            for book in books {
                print_book(book, catalog.is_purchased(book.id));
            }
        }
        Commands::Genres => {
            for genre in catalog.genres() {
                println!("{}", genre);
            }
        }
        Commands::Library => {
            let owned = catalog.purchased_books();
            println!("{}", Tab::Library.label(owned.len()));
            if owned.is_empty() {
                println!("Your library is empty. Start browsing the store to add books.");
            }
            for book in owned {
                print_book(book, true);
            }
        }
        Commands::Buy { book_id, yes } => {
            let book = find(catalog, book_id)?;
            let outcome = catalog.purchase(&book, |prompt| yes || confirm(prompt)).await;
            if let Some(notice) = outcome.notice() {
                println!("{}", notice);
            }
        }
        Commands::Read { book_id } => {
            let book = find(catalog, book_id)?;
            match catalog.view(&book) {
                ViewOutcome::Open(url) => println!("{}", url),
                outcome => println!("{}", outcome.notice().unwrap_or_default()),
            }
        }
        Commands::Upload {
            title,
            author,
            price,
            description,
            genre,
            cover_url,
            file_url,
            published_date,
        } => {
            if shell::select_tab(Tab::Upload, catalog.profile()) != Tab::Upload {
                bail!("Only authors and admins can upload books");
            }
            let mut form = UploadForm::new();
            form.set(UploadField::Title, title);
            form.set(UploadField::Author, author);
            form.set(UploadField::Price, price);
            form.set(UploadField::Description, description);
            form.set(UploadField::Genre, genre);
            form.set(UploadField::CoverUrl, cover_url);
            form.set(UploadField::FileUrl, file_url);
            form.set(UploadField::PublishedDate, published_date);

            let outcome = catalog.upload(&mut form).await;
            println!("{}", outcome.notice());
            if let UploadOutcome::Uploaded(book) = outcome {
                print_book(&book, false);
            }
        }
        Commands::SignIn { .. } | Commands::SignUp { .. } | Commands::SignOut | Commands::Whoami => {
            bail!("not a storefront command")
        }
    }
    Ok(())
}

fn find(catalog: &Catalog, book_id: Uuid) -> anyhow::Result<Book> {
    catalog
        .find_book(book_id)
        .cloned()
        .with_context(|| format!("No book with id {}", book_id))
}

fn print_book(book: &Book, owned: bool) {
    let marker = if owned { " [Owned]" } else { "" };
    println!("{}  {} - {}  {}{}", book.id, book.title, book.author, book.display_price(), marker);
    if let Some(genre) = &book.genre {
        println!("    Genre: {}", genre);
    }
    if let Some(description) = &book.description {
        println!("    {}", description);
    }
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
