//! Project access rules shared by the services
//!
//! A user can see a project when they are an admin, its manager, or an
//! active team member. Managing a project needs admin or manager rights.

use crate::domain::entities::{Project, ProjectId, User};
use crate::domain::ports::ProjectRepository;
use crate::error::{AppError, DomainError};

/// Load a project or fail with 404
pub async fn load_project<P: ProjectRepository + ?Sized>(
    projects: &P,
    id: &ProjectId,
) -> Result<Project, AppError> {
    projects
        .find_by_id(id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("Project {} not found", id)).into())
}

/// Whether `user` may see `project`
pub async fn can_access<P: ProjectRepository + ?Sized>(
    projects: &P,
    user: &User,
    project: &Project,
) -> Result<bool, AppError> {
    if user.is_admin() || project.manager_id == user.id {
        return Ok(true);
    }
    Ok(projects
        .find_member(&project.id, &user.id)
        .await?
        .is_some_and(|m| m.is_active()))
}

/// Load a project the user is allowed to see
pub async fn ensure_project_access<P: ProjectRepository + ?Sized>(
    projects: &P,
    user: &User,
    id: &ProjectId,
) -> Result<Project, AppError> {
    let project = load_project(projects, id).await?;
    if !can_access(projects, user, &project).await? {
        return Err(AppError::forbidden(
            "Not enough permissions to access this project",
        ));
    }
    Ok(project)
}

/// Admins and the project's manager may change it
pub fn can_manage(user: &User, project: &Project) -> bool {
    user.is_admin() || project.manager_id == user.id
}

pub fn ensure_can_manage(user: &User, project: &Project) -> Result<(), AppError> {
    if can_manage(user, project) {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "Only the project manager or an admin can do this",
        ))
    }
}

/// Projects visible to the user; `None` means every project (admins)
pub async fn accessible_project_ids<P: ProjectRepository + ?Sized>(
    projects: &P,
    user: &User,
) -> Result<Option<Vec<ProjectId>>, AppError> {
    if user.is_admin() {
        return Ok(None);
    }
    Ok(Some(projects.project_ids_for_member(&user.id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::UserRole;
    use crate::test_utils::{test_project, test_user, test_user_with_role, InMemoryProjectRepository};

    #[tokio::test]
    async fn manager_and_members_have_access() {
        let manager = test_user_with_role(UserRole::TeamLead);
        let member = test_user();
        let stranger = test_user();
        let project = test_project(&manager.id);
        let repo = InMemoryProjectRepository::new()
            .with_project(project.clone())
            .with_member(project.id, member.id);

        assert!(ensure_project_access(&repo, &manager, &project.id).await.is_ok());
        assert!(ensure_project_access(&repo, &member, &project.id).await.is_ok());

        let err = ensure_project_access(&repo, &stranger, &project.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn admins_see_everything() {
        let admin = test_user_with_role(UserRole::Executive);
        let project = test_project(&test_user().id);
        let repo = InMemoryProjectRepository::new().with_project(project.clone());

        assert!(ensure_project_access(&repo, &admin, &project.id).await.is_ok());
        assert!(accessible_project_ids(&repo, &admin).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let repo = InMemoryProjectRepository::new();
        let err = ensure_project_access(&repo, &test_user(), &ProjectId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn member_project_ids_are_scoped() {
        let member = test_user();
        let visible = test_project(&test_user().id);
        let hidden = test_project(&test_user().id);
        let repo = InMemoryProjectRepository::new()
            .with_project(visible.clone())
            .with_project(hidden)
            .with_member(visible.id, member.id);

        let ids = accessible_project_ids(&repo, &member).await.unwrap().unwrap();
        assert_eq!(ids, vec![visible.id]);
    }

    #[test]
    fn only_admin_or_manager_can_manage() {
        let manager = test_user();
        let project = test_project(&manager.id);
        assert!(can_manage(&manager, &project));
        assert!(can_manage(&test_user_with_role(UserRole::ProjectManager), &project));
        assert!(!can_manage(&test_user_with_role(UserRole::TeamLead), &project));
    }
}
