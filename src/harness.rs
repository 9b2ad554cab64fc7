// Harness commands - run components against the in-memory collaborators
//
// `check` describes an envelope without touching a page. `upload` builds an
// upload form in a MemoryDom, attaches the UploadWorkflow with a
// MemoryUploader, and plays a full pick -> upload -> answer cycle.

use crate::cli::UploadArgs;
use anyhow::{bail, Context, Result};
use fraghand::config::Config;
use fraghand::dom::{dispatch, Dom, ElementRef, MemoryDom, NativeEventKind, SharedDom};
use fraghand::envelope::{Envelope, Route};
use fraghand::events::names;
use fraghand::handler::{ComponentHandler, Id, UploadWorkflow, UploadWorkflowOptions};
use fraghand::logging::{LogBuffer, LogLevel};
use fraghand::uploader::{
    add_files, upload_next, MemoryUploader, MultipartParams, QueuedFile, SharedUploader, UploadEngine,
};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io::Read;
use std::rc::Rc;

const UPLOAD_FORM_ID: &str = "uploadForm";

// ─────────────────────────────────────────────────────────────────────────────
// check
// ─────────────────────────────────────────────────────────────────────────────

pub fn check(source: &str, config: &Config) -> Result<()> {
    let raw = read_source(source)?;
    let envelope = Envelope::parse(&raw)
        .with_context(|| format!("{source} is not a response envelope (transport failure)"))?;

    for line in describe(&envelope, &config.default_region) {
        println!("{line}");
    }
    Ok(())
}

fn read_source(source: &str) -> Result<String> {
    if source == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read envelope from stdin")?;
        Ok(raw)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read {source}"))
    }
}

/// What handling `envelope` would do, one step per line
fn describe(envelope: &Envelope, default_region: &str) -> Vec<String> {
    let mut lines = Vec::new();
    match envelope.route() {
        Route::Failure(message) => {
            lines.push("status: application failure".to_string());
            lines.push(format!("show error: {message}"));
            // Nothing else runs on failure
            return lines;
        }
        Route::Script(script) => {
            lines.push("status: ok".to_string());
            lines.push(format!("execute script ({} bytes)", script.len()));
        }
        Route::Replace { region, markup } => {
            lines.push("status: ok".to_string());
            lines.push(format!(
                "replace #{} ({} bytes of markup)",
                region.unwrap_or(default_region),
                markup.len()
            ));
        }
        Route::Terminal => {
            lines.push("status: ok".to_string());
            lines.push("no content: terminal success".to_string());
        }
    }

    if let Some(event) = envelope.event() {
        lines.push(format!(
            "dispatch event: {} {}",
            event.name,
            Value::Object(event.data.clone())
        ));
    }
    for (key, value) in envelope.additional_attributes() {
        lines.push(format!("attribute: {key} = {value}"));
    }
    lines
}

// ─────────────────────────────────────────────────────────────────────────────
// upload
// ─────────────────────────────────────────────────────────────────────────────

pub fn upload(args: UploadArgs, captured: &LogBuffer) -> Result<()> {
    let raw_options = std::fs::read_to_string(&args.options)
        .with_context(|| format!("failed to read {}", args.options.display()))?;
    let options = UploadWorkflowOptions::from_json(&raw_options)
        .with_context(|| format!("invalid upload options in {}", args.options.display()))?;
    let response = std::fs::read_to_string(&args.response)
        .with_context(|| format!("failed to read {}", args.response.display()))?;
    let markup = match &args.markup {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => default_markup(&options),
    };

    let memory = Rc::new(RefCell::new(MemoryDom::with_region(UPLOAD_FORM_ID, &markup)));
    let dom: SharedDom = memory.clone();
    let engine = Rc::new(RefCell::new(MemoryUploader::new()));
    let uploader: SharedUploader = engine.clone();
    let workflow = UploadWorkflow::attach(
        Rc::clone(&dom),
        Rc::clone(&uploader),
        ElementRef::new(UPLOAD_FORM_ID),
        options,
    )
    .context("failed to attach the upload workflow")?;

    let events = Rc::new(RefCell::new(Vec::new()));
    for name in [names::FILE_UPLOADED, names::FORM_SUBMITTED] {
        let sink = Rc::clone(&events);
        workflow
            .borrow()
            .on(name, move |payload: &Value| sink.borrow_mut().push(format!("{name} {payload}")));
    }

    if let Some(revision) = &args.revision {
        select(&dom, "revisedFileId", revision)?;
    }
    if let Some(genre) = &args.genre {
        select(&dom, "genreId", genre)?;
    }

    let picked = if args.files.is_empty() {
        vec!["upload.bin".to_string()]
    } else {
        args.files
    };
    let files = picked
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let size = std::fs::metadata(&name).map(|m| m.len()).unwrap_or(0);
            QueuedFile::new(format!("o_{i}"), name, size)
        })
        .collect();
    add_files(&uploader, files);
    let queue: Vec<String> = engine.borrow().files().iter().map(|f| f.name.clone()).collect();
    println!("queue: {}", queue.join(", "));

    let sent = Rc::new(RefCell::new(MultipartParams::new()));
    let seen = Rc::clone(&sent);
    let Some(file) = upload_next(&uploader, move |_, params| {
        *seen.borrow_mut() = params.clone();
        response
    }) else {
        bail!("nothing was queued for upload");
    };

    println!("uploaded: {} ({} bytes)", file.name, file.size);
    println!("multipart params:");
    for (key, value) in sent.borrow().iter() {
        println!("  {key} = {value:?}");
    }
    println!("events:");
    for event in events.borrow().iter() {
        println!("  {event}");
    }

    let memory = memory.borrow();
    for (region, markup) in memory.replacements() {
        println!("replaced #{region}: {markup}");
    }
    for error in memory.errors() {
        println!("error shown: {error}");
    }
    for script in memory.scripts() {
        println!("script run: {script}");
    }
    println!("component: {:?}", workflow.borrow().state());

    let warnings = captured.at_least(LogLevel::Warn);
    if !warnings.is_empty() {
        println!("warnings:");
        for warning in warnings {
            println!("  {warning}");
        }
    }
    Ok(())
}

/// Pick `value` in a selector the way a user would
fn select(dom: &SharedDom, id: &str, value: &str) -> Result<()> {
    let selector = dom.borrow().find(&ElementRef::new(UPLOAD_FORM_ID), id);
    let Some(selector) = selector else {
        bail!("the upload form has no #{id}");
    };
    if dom.borrow().is_disabled(&selector) {
        println!("#{id} is locked, keeping its value");
        return Ok(());
    }
    dom.borrow_mut().set_value(&selector, value);
    dispatch(dom, &selector, NativeEventKind::Change);
    Ok(())
}

/// Upload form matching what the options say the server rendered
fn default_markup(options: &UploadWorkflowOptions) -> String {
    let mut markup = format!(r#"<form id="{UPLOAD_FORM_ID}">"#);

    if options.has_file_selector {
        markup.push_str(r#"<select id="revisedFileId"><option value="0" selected>New file</option>"#);
        let files: BTreeSet<&str> = options.file_genres.keys().map(Id::as_str).collect();
        for file in files {
            markup.push_str(&format!(r#"<option value="{file}">File {file}</option>"#));
        }
        markup.push_str("</select>");
    }

    if options.has_genre_selector {
        let mut genres: BTreeSet<&str> = options.file_genres.values().map(Id::as_str).collect();
        if genres.is_empty() {
            genres.insert("1");
        }
        markup.push_str(r#"<select id="genreId">"#);
        for genre in genres {
            markup.push_str(&format!(r#"<option value="{genre}">Genre {genre}</option>"#));
        }
        markup.push_str("</select>");
    }

    markup.push_str(&format!(r#"<div id="{}"></div></form>"#, options.uploader));
    markup
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_replacement_with_event() {
        let envelope = Envelope::parse(
            r#"{"status":true,"content":"<form></form>","elementId":"0","uploadedFile":{"id":3},"event":{"name":"fileUploaded","data":{"id":7}}}"#,
        )
        .unwrap();

        assert_eq!(
            describe(&envelope, "main"),
            vec![
                "status: ok",
                "replace #main (13 bytes of markup)",
                r#"dispatch event: fileUploaded {"id":7}"#,
                r#"attribute: uploadedFile = {"id":3}"#,
            ]
        );
    }

    #[test]
    fn test_describe_failure_stops_early() {
        let envelope = Envelope::parse(
            r#"{"status":false,"content":"File too large","event":{"name":"x","data":{}}}"#,
        )
        .unwrap();
        assert_eq!(
            describe(&envelope, "main"),
            vec!["status: application failure", "show error: File too large"]
        );
    }

    #[test]
    fn test_describe_script_and_terminal() {
        let script = Envelope::success("init()").as_script();
        assert_eq!(describe(&script, "main")[1], "execute script (6 bytes)");

        let terminal = Envelope::success("").with_element_id("grid");
        assert_eq!(describe(&terminal, "main")[1], "no content: terminal success");
    }

    #[test]
    fn test_default_markup_satisfies_workflow() {
        let options = UploadWorkflowOptions::from_json(
            r#"{"hasFileSelector":true,"hasGenreSelector":true,"fileGenres":{"12":3},"$uploader":"plupload"}"#,
        )
        .unwrap();
        let markup = default_markup(&options);
        let dom: SharedDom = Rc::new(RefCell::new(MemoryDom::with_region(UPLOAD_FORM_ID, &markup)));
        let uploader: SharedUploader = Rc::new(RefCell::new(MemoryUploader::new()));

        let workflow =
            UploadWorkflow::attach(Rc::clone(&dom), uploader, ElementRef::new(UPLOAD_FORM_ID), options);
        assert!(workflow.is_ok());

        select(&dom, "revisedFileId", "12").unwrap();
        let genre = ElementRef::new("genreId");
        assert_eq!(dom.borrow().value(&genre).as_deref(), Some("3"));
        assert!(dom.borrow().is_disabled(&genre));
        assert!(select(&dom, "missing", "1").is_err());
    }
}
