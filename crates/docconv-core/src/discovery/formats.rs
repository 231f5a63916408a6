//! Static format tables used when a binary cannot list its own formats.

use crate::config::ToolKind;
use crate::version::major_version;

const PANDOC_3_INPUTS: &[&str] = &[
    "biblatex", "bibtex", "bits", "commonmark", "commonmark_x", "creole", "csljson", "csv",
    "djot", "docbook", "docx", "dokuwiki", "endnotexml", "epub", "fb2", "gfm", "haddock", "html",
    "ipynb", "jats", "jira", "json", "latex", "man", "markdown", "markdown_github", "markdown_mmd",
    "markdown_phpextra", "markdown_strict", "mdoc", "mediawiki", "muse", "native", "odt", "opml",
    "org", "pod", "ris", "rst", "rtf", "t2t", "textile", "tikiwiki", "tsv", "twiki", "typst",
    "vimwiki",
];

const PANDOC_3_OUTPUTS: &[&str] = &[
    "ansi", "asciidoc", "asciidoc_legacy", "asciidoctor", "beamer", "biblatex", "bibtex",
    "chunkedhtml", "commonmark", "commonmark_x", "context", "csljson", "djot", "docbook",
    "docbook4", "docbook5", "docx", "dokuwiki", "dzslides", "epub", "epub2", "epub3", "fb2", "gfm",
    "haddock", "html", "html4", "html5", "icml", "ipynb", "jats", "jats_archiving",
    "jats_articleauthoring", "jats_publishing", "jira", "json", "latex", "man", "markdown",
    "markdown_github", "markdown_mmd", "markdown_phpextra", "markdown_strict", "markua",
    "mediawiki", "ms", "muse", "native", "odt", "opendocument", "opml", "org", "pdf", "plain",
    "pptx", "revealjs", "rst", "rtf", "s5", "slideous", "slidy", "tei", "texinfo", "textile",
    "typst", "xwiki", "zimwiki",
];

const PANDOC_2_INPUTS: &[&str] = &[
    "biblatex", "bibtex", "commonmark", "commonmark_x", "creole", "csljson", "csv", "docbook",
    "docx", "dokuwiki", "epub", "fb2", "gfm", "haddock", "html", "ipynb", "jats", "jira", "json",
    "latex", "man", "markdown", "markdown_github", "markdown_mmd", "markdown_phpextra",
    "markdown_strict", "mediawiki", "muse", "native", "odt", "opml", "org", "rst", "rtf", "t2t",
    "textile", "tikiwiki", "twiki", "vimwiki",
];

const PANDOC_2_OUTPUTS: &[&str] = &[
    "asciidoc", "asciidoctor", "beamer", "biblatex", "bibtex", "commonmark", "commonmark_x",
    "context", "csljson", "docbook", "docbook4", "docbook5", "docx", "dokuwiki", "dzslides",
    "epub", "epub2", "epub3", "fb2", "gfm", "haddock", "html", "html4", "html5", "icml", "ipynb",
    "jats", "jats_archiving", "jats_articleauthoring", "jats_publishing", "jira", "json", "latex",
    "man", "markdown", "markdown_github", "markdown_mmd", "markdown_phpextra", "markdown_strict",
    "markua", "mediawiki", "ms", "muse", "native", "odt", "opendocument", "opml", "org", "pdf",
    "plain", "pptx", "revealjs", "rst", "rtf", "s5", "slideous", "slidy", "tei", "texinfo",
    "textile", "xwiki", "zimwiki",
];

const PANDOC_MINIMAL_INPUTS: &[&str] = &["docx", "html", "latex", "markdown", "rst"];

const PANDOC_MINIMAL_OUTPUTS: &[&str] = &[
    "docx", "epub", "html", "latex", "markdown", "pdf", "plain", "rst",
];

const TYPST_INPUTS: &[&str] = &["typst"];
const TYPST_OUTPUTS: &[&str] = &["pdf", "png", "svg"];

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// `(inputs, outputs)` assumed for `tool` at `version`.
pub fn fallback_formats(tool: ToolKind, version: &str) -> (Vec<String>, Vec<String>) {
    match tool {
        ToolKind::Pandoc => match major_version(version) {
            Some(major) if major >= 3 => (owned(PANDOC_3_INPUTS), owned(PANDOC_3_OUTPUTS)),
            Some(2) => (owned(PANDOC_2_INPUTS), owned(PANDOC_2_OUTPUTS)),
            _ => (owned(PANDOC_MINIMAL_INPUTS), owned(PANDOC_MINIMAL_OUTPUTS)),
        },
        ToolKind::Typst => (owned(TYPST_INPUTS), owned(TYPST_OUTPUTS)),
    }
}

/// Parse one-format-per-line output of `--list-*-formats`.
pub fn parse_format_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
