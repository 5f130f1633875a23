use crate::error::Result;
use crate::extractor::ProviderFunction;
use crate::generator::format::SourceFormatter;
use crate::generator::{write_generated_file, GeneratorSettings, ImportNames, GENERATED_MARKER};
use log::info;
use std::collections::BTreeMap;
use std::path::PathBuf;

const WIRE_IMPORT: &str = "github.com/google/wire";

/// Renders and writes the aggregated Wire provider set.
///
/// Providers are grouped by package directory in order of the name the package is
/// referenced by, and sorted by function name within each group, so the file depends only
/// on the set of providers.
pub struct DependencyGenerator {
    settings: GeneratorSettings,
    output_file: String,
}

impl DependencyGenerator {
    pub fn new(settings: GeneratorSettings, output_file: impl Into<String>) -> Self {
        Self {
            settings,
            output_file: output_file.into(),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.settings.output_path(&self.output_file)
    }

    /// Renders, formats, and writes the file, returning its path
    pub fn generate(
        &self,
        providers: &[ProviderFunction],
        formatter: &dyn SourceFormatter,
    ) -> Result<PathBuf> {
        let path = self.output_path();
        let source = self.render(providers);
        write_generated_file(&path, &source, formatter)?;
        info!("Generated {} providers in {}", providers.len(), path.display());
        Ok(path)
    }

    /// Renders the unformatted Go source
    pub fn render(&self, providers: &[ProviderFunction]) -> String {
        let located: Vec<(String, &ProviderFunction)> = providers
            .iter()
            .map(|p| (self.settings.import_path(&p.source_file), p))
            .collect();
        let imports = self.imports(&located);

        let mut groups: BTreeMap<&str, (Option<&str>, Vec<&ProviderFunction>)> = BTreeMap::new();
        for (import_path, provider) in &located {
            let qualifier = imports.name(import_path);
            let name = qualifier.unwrap_or(&provider.package);
            groups
                .entry(name)
                .or_insert_with(|| (qualifier, Vec::new()))
                .1
                .push(*provider);
        }
        for (_, group) in groups.values_mut() {
            group.sort_by(|a, b| {
                (&a.function_name, &a.source_file).cmp(&(&b.function_name, &b.source_file))
            });
        }

        let mut lines = vec![
            GENERATED_MARKER.to_string(),
            String::new(),
            format!("package {}", self.settings.package),
            String::new(),
            "import (".to_string(),
            format!("\t\"{}\"", WIRE_IMPORT),
        ];
        if !imports.is_empty() {
            lines.push(String::new());
            lines.extend(imports.import_lines());
        }
        lines.push(")".to_string());
        lines.push(String::new());

        lines.push("// GeneratedProviderSet aggregates every discovered provider.".to_string());
        lines.push("var GeneratedProviderSet = wire.NewSet(".to_string());
        for (index, (name, (qualifier, group))) in groups.iter().enumerate() {
            if index > 0 {
                lines.push(String::new());
            }
            lines.push(format!("\t// {}", name));
            for provider in group {
                lines.push(format!("\t{},", reference(*qualifier, provider)));
            }
        }
        lines.push(")".to_string());

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Names for every provider package outside the output package
    fn imports(&self, located: &[(String, &ProviderFunction)]) -> ImportNames {
        let local = self.settings.output_import_path();
        let packages: BTreeMap<&str, &str> = located
            .iter()
            .filter(|(path, p)| !p.package.is_empty() && *path != local)
            .map(|(path, p)| (path.as_str(), p.package.as_str()))
            .collect();

        ImportNames::assign(packages, &[self.settings.package.as_str(), "wire"])
    }
}

/// Provider reference, unqualified for providers in the output package
fn reference(qualifier: Option<&str>, provider: &ProviderFunction) -> String {
    match qualifier {
        Some(name) => format!("{}.{}", name, provider.function_name),
        None => provider.function_name.clone(),
    }
}
