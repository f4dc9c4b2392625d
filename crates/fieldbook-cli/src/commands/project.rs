//! Project commands

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use serde_json::json;

use crate::output::{table, to_json, OutputFormat};
use crate::{AppContext, Cli};
use fieldbook_core::{
    DefinitionErrors, DefinitionValidator, Error as CoreError, Project, ProjectAccess, ProjectDefinition, ProjectId,
    ProjectRole,
};
use fieldbook_storage::EntryStore;

#[derive(Args)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommands,
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List all projects
    List,
    /// Create a project from a definition file
    Create {
        /// Project name
        name: String,
        /// Definition file (JSON)
        definition: PathBuf,
        /// Only members may upload
        #[arg(long)]
        private: bool,
    },
    /// Replace a project's definition, bumping its version
    Update {
        /// Project name or id
        name: String,
        /// Definition file (JSON)
        definition: PathBuf,
    },
    /// Check a definition file without saving anything
    Validate {
        /// Definition file (JSON)
        definition: PathBuf,
    },
    /// Show a project with its forms and entry counts
    Show {
        /// Project name or id
        name: String,
    },
    /// Delete every entry of a project, keeping its definition
    Wipe {
        /// Project name or id
        name: String,
        /// Skip the confirmation
        #[arg(short, long)]
        force: bool,
    },
    /// Give a user a role in a project
    Grant {
        /// Project name or id
        name: String,
        /// User id
        user_id: u64,
        /// creator, manager, curator, collector or viewer
        role: ProjectRole,
    },
}

fn read_definition(path: &Path) -> anyhow::Result<ProjectDefinition> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    ProjectDefinition::from_json(&content).with_context(|| format!("parsing definition {}", path.display()))
}

fn report(errors: DefinitionErrors) -> anyhow::Error {
    for error in errors.errors() {
        eprintln!("  {}: {}", error.source, error.code);
    }
    anyhow::anyhow!("definition rejected with {} error(s)", errors.errors().len())
}

fn report_project(error: CoreError) -> anyhow::Error {
    match error {
        CoreError::Definition(errors) => report(errors),
        CoreError::InvalidProjectName(name) => {
            anyhow::anyhow!("Invalid project name '{}': use letters, digits, '_' or '-'", name)
        }
        other => other.into(),
    }
}

/// Look a project up by name, then by id
pub async fn resolve(ctx: &AppContext, name_or_id: &str) -> anyhow::Result<Project> {
    if let Some(project) = ctx.storage.get_project_by_name(name_or_id).await? {
        return Ok(project);
    }
    if let Ok(id) = ProjectId::from_string(name_or_id) {
        if let Some(project) = ctx.storage.get_project(&id).await? {
            return Ok(project);
        }
    }
    anyhow::bail!("Project '{}' not found", name_or_id)
}

fn summary(project: &Project) -> serde_json::Value {
    json!({
        "id": project.id.to_string(),
        "name": project.name,
        "status": project.status,
        "access": project.access,
        "version": project.project_version(),
    })
}

pub async fn run(args: &ProjectArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    tracing::debug!("Running project command");
    let format = cli.output();

    match &args.command {
        ProjectCommands::List => {
            let projects = ctx.storage.get_all_projects().await?;
            tracing::info!("Found {} projects", projects.len());

            if format == OutputFormat::Json {
                let list: Vec<_> = projects.iter().map(summary).collect();
                println!("{}", to_json(&list));
            } else if projects.is_empty() {
                println!("No projects found. Create one with 'fieldbook project create <name> <definition.json>'");
            } else {
                let rows: Vec<Vec<String>> = projects
                    .iter()
                    .map(|p| {
                        vec![
                            p.name.clone(),
                            p.id.to_string(),
                            format!("{:?}", p.status).to_lowercase(),
                            p.project_version(),
                        ]
                    })
                    .collect();
                println!("{}", table(&["name", "id", "status", "version"], &rows));
            }
        }
        ProjectCommands::Create {
            name,
            definition,
            private,
        } => {
            if ctx.storage.get_project_by_name(name).await?.is_some() {
                anyhow::bail!("Project '{}' already exists", name);
            }

            let definition = read_definition(definition)?;
            let mut project = Project::from_definition(name.as_str(), definition, &ctx.config.limits)
                .map_err(report_project)?;
            if *private {
                project = project.with_access(ProjectAccess::Private);
            }

            ctx.storage.save_project(&project).await?;
            tracing::info!("Created project: {}", name);

            if format == OutputFormat::Json {
                println!("{}", to_json(&summary(&project)));
            } else {
                println!("Created project: {}", name);
                println!("  id: {}", project.id);
                println!("  version: {}", project.project_version());
            }
        }
        ProjectCommands::Update { name, definition } => {
            let mut project = resolve(ctx, name).await?;
            let definition = read_definition(definition)?;
            project
                .replace_structure(definition, &ctx.config.limits)
                .map_err(report_project)?;

            ctx.storage.save_project(&project).await?;
            tracing::info!("Updated project structure: {}", project.name);

            if format == OutputFormat::Json {
                println!("{}", to_json(&summary(&project)));
            } else {
                println!("Updated project: {}", project.name);
                println!("  version: {}", project.project_version());
            }
        }
        ProjectCommands::Validate { definition } => {
            let definition = read_definition(definition)?;
            let extra = DefinitionValidator::new(ctx.config.limits.clone())
                .validate(&definition)
                .map_err(report)?;
            println!(
                "Definition is valid: {} form(s), {} input(s)",
                extra.form_order.len(),
                extra.total_inputs
            );
        }
        ProjectCommands::Show { name } => {
            let project = resolve(ctx, name).await?;

            let mut forms = Vec::with_capacity(project.extra.form_order.len());
            for form_ref in &project.extra.form_order {
                let count = ctx.storage.count_entries(&project.id, form_ref, None).await?;
                let form_name = project
                    .extra
                    .form(form_ref)
                    .map(|f| f.name.clone())
                    .unwrap_or_default();
                let limit = project
                    .extra
                    .entries_limit(form_ref)
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "-".to_string());
                forms.push((form_ref.clone(), form_name, count, limit));
            }

            if format == OutputFormat::Json {
                let mut value = summary(&project);
                value["forms"] = forms
                    .iter()
                    .map(|(form_ref, form_name, count, limit)| {
                        json!({"ref": form_ref, "name": form_name, "entries": count, "limit": limit})
                    })
                    .collect();
                println!("{}", to_json(&value));
            } else {
                println!("Project '{}'", project.name);
                println!("  id: {}", project.id);
                println!("  status: {:?}, access: {:?}", project.status, project.access);
                println!("  version: {}", project.project_version());
                println!("  members: {}", project.members.len());
                println!();
                let rows: Vec<Vec<String>> = forms
                    .into_iter()
                    .map(|(form_ref, form_name, count, limit)| vec![form_ref, form_name, count.to_string(), limit])
                    .collect();
                println!("{}", table(&["form", "name", "entries", "limit"], &rows));
            }
        }
        ProjectCommands::Wipe { name, force } => {
            let project = resolve(ctx, name).await?;
            let total = ctx.storage.list_entries(&project.id, None).await?.len();

            if !force {
                println!("Project '{}' has {} entries", project.name, total);
                println!("Use --force to confirm deletion");
                return Ok(());
            }

            let deleted = ctx.storage.delete_project_entries(&project.id).await?;
            tracing::info!("Wiped project: {} ({} rows)", project.name, deleted);
            println!("Wiped project: {} ({} rows deleted)", project.name, deleted);
        }
        ProjectCommands::Grant { name, user_id, role } => {
            let mut project = resolve(ctx, name).await?;
            project.members.insert(*user_id, *role);
            ctx.storage.save_project(&project).await?;
            println!("Granted {:?} on '{}' to user {}", role, project.name, user_id);
        }
    }

    Ok(())
}
