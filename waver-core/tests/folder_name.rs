use std::path::Path;

use waver_core::path_util::{absolute_path, folder_name};

#[test]
fn strips_exactly_one_git_suffix() {
    assert_eq!(folder_name("https://host/user/repo.git").as_deref(), Some("repo"));
    assert_eq!(folder_name("/path/to/project").as_deref(), Some("project"));
    assert_eq!(folder_name("/path/to/project.git.git").as_deref(), Some("project.git"));
    assert_eq!(folder_name("git@github.com:user/tool.git").as_deref(), Some("tool"));
}

#[test]
fn interior_git_is_left_alone() {
    assert_eq!(folder_name("/src/my.git.repo").as_deref(), Some("my.git.repo"));
    assert_eq!(folder_name("/src/gitter").as_deref(), Some("gitter"));
}

#[test]
fn trailing_separator_is_ignored() {
    assert_eq!(folder_name("/path/to/project/").as_deref(), Some("project"));
}

#[test]
fn blank_or_nameless_inputs_yield_none() {
    assert_eq!(folder_name(""), None);
    assert_eq!(folder_name(" \t "), None);
    assert_eq!(folder_name("/"), None);
    assert_eq!(folder_name(".git"), None);
}

#[test]
fn absolute_path_keeps_absolute_and_resolves_relative() {
    let cwd = std::env::current_dir().unwrap();
    assert_eq!(absolute_path(Path::new("output")).unwrap(), cwd.join("output"));

    let already = cwd.join("x");
    assert_eq!(absolute_path(&already).unwrap(), already);
}
